//! The Token API's `{error, message, details?}` envelope (spec.md §6/§7),
//! and the HTTP status each [`BillingError`] variant maps to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use creditcore_domain_billing::BillingError;
use serde::Serialize;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Billing(BillingError),
    InvalidAmount,
    Internal(anyhow::Error),
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError::Billing(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// The `entity_not_found` refinement the Token API table wants
    /// (`user_not_found`) instead of the generic `not_found` code
    /// [`BillingError::code`] carries for every entity kind.
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            ApiError::Billing(BillingError::NotFound { entity, .. }) => {
                let code: &'static str = if *entity == "user" { "user_not_found" } else { "not_found" };
                (code, StatusCode::NOT_FOUND)
            }
            ApiError::Billing(err @ BillingError::InsufficientBalance { .. }) => (err.code(), StatusCode::CONFLICT),
            ApiError::Billing(err @ BillingError::SubscriptionExpired) => (err.code(), StatusCode::FORBIDDEN),
            ApiError::Billing(err @ BillingError::UserBlocked) => (err.code(), StatusCode::FORBIDDEN),
            ApiError::Billing(err @ BillingError::ConcurrentModification) => (err.code(), StatusCode::CONFLICT),
            ApiError::Billing(err @ BillingError::Duplicate) => (err.code(), StatusCode::CONFLICT),
            ApiError::Billing(err @ BillingError::Validation(_)) => (err.code(), StatusCode::BAD_REQUEST),
            ApiError::Billing(err @ BillingError::Payment(_)) => (err.code(), StatusCode::BAD_GATEWAY),
            ApiError::InvalidAmount => ("invalid_amount", StatusCode::BAD_REQUEST),
            ApiError::Internal(_) => ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code_and_status();
        let message = match &self {
            ApiError::Billing(err) => err.to_string(),
            ApiError::InvalidAmount => "amount must be a positive decimal".to_string(),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "internal error".to_string()
            }
        };
        (status, Json(json!(ErrorBody { error: code, message, details: None }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
