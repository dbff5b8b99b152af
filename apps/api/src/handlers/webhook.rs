//! Webhook intake (spec.md §6): form-urlencoded signature verification and
//! the request/response shape. The state-machine orchestration itself lives
//! in [`crate::services::payment`] so it can be unit-tested without an
//! HTTP layer around it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use creditcore_infra_payment::WebhookPayload;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::payment::{process_webhook, WebhookOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "OutSum")]
    pub out_sum: Decimal,
    #[serde(rename = "InvId")]
    pub inv_id: i64,
    #[serde(rename = "SignatureValue")]
    pub signature_value: String,
    #[serde(rename = "Shp_invoice_id")]
    pub shp_invoice_id: Uuid,
    #[serde(rename = "Shp_user_id")]
    pub shp_user_id: i64,
    #[serde(rename = "Fee")]
    pub fee: Option<Decimal>,
    #[serde(rename = "Email")]
    pub email: Option<String>,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: Option<String>,
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(_provider): Path<String>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let inv_id = form.inv_id;
    let payload = WebhookPayload {
        out_sum: form.out_sum,
        inv_id: form.inv_id,
        signature: form.signature_value,
        invoice_id: form.shp_invoice_id,
        user_id: form.shp_user_id,
        fee: form.fee,
        email: form.email,
        payment_method: form.payment_method,
    };

    if !state.verifier.verify(&payload) {
        tracing::warn!(inv_id, "webhook signature verification failed");
        return (StatusCode::BAD_REQUEST, "bad signature").into_response();
    }

    match process_webhook(&state, &payload).await {
        Ok(WebhookOutcome::Processed | WebhookOutcome::AlreadyProcessed) => {
            (StatusCode::OK, state.verifier.success_response(inv_id)).into_response()
        }
        Ok(WebhookOutcome::GatewayRefMismatch) => (StatusCode::BAD_REQUEST, "gateway_ref mismatch").into_response(),
        Ok(WebhookOutcome::InvoiceNotFound) => (StatusCode::NOT_FOUND, "invoice not found").into_response(),
        Err(err) => {
            tracing::error!(error = %err, inv_id, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
