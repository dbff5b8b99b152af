//! The Token API (spec.md §6): read-only balance lookup and the `spend`
//! primitive external services use to debit a user for consumed work.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use creditcore_domain_billing::BillingError;
use creditcore_domain_models::{actions, TransactionType};
use creditcore_domain_notification::{kind_for_threshold, threshold_to_notify, Notification};
use creditcore_infra_db::repositories::audit::AuditEntry;
use creditcore_infra_db::repositories::transactions::LedgerEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub token_balance: Decimal,
    pub subscription_active: bool,
    pub subscription_end: Option<chrono::DateTime<Utc>>,
    pub can_spend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn get_balance(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<Json<BalanceResponse>> {
    let user = state
        .users
        .get(user_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::NotFound { entity: "user", id: user_id.to_string() })?;

    let now = Utc::now();
    let subscription_active = user.subscription_active(now);
    let (can_spend, reason) = if user.is_blocked {
        (false, Some("user_blocked"))
    } else if !subscription_active {
        (false, Some("subscription_expired"))
    } else {
        (true, None)
    };

    Ok(Json(BalanceResponse {
        user_id: user.id,
        token_balance: user.balance,
        subscription_active,
        subscription_end: user.subscription_end,
        can_spend,
        reason,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    pub amount: Decimal,
    pub description: String,
    pub idempotency_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SpendResponse {
    pub transaction_id: Uuid,
    pub tokens_spent: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

pub async fn spend(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<SpendRequest>,
) -> ApiResult<Json<SpendResponse>> {
    if body.amount <= Decimal::ZERO {
        return Err(ApiError::InvalidAmount);
    }

    let user = state
        .users
        .get(user_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::NotFound { entity: "user", id: user_id.to_string() })?;

    if !user.subscription_active(Utc::now()) {
        return Err(BillingError::SubscriptionExpired.into());
    }

    let balance_before = user.balance;

    let entry = LedgerEntry {
        user_id,
        transaction_type: TransactionType::Spend,
        delta: -body.amount,
        description: &body.description,
        invoice_id: None,
        metadata: body.metadata,
        idempotency_key: body.idempotency_key.as_deref(),
        allow_deferred: false,
        floor: state.config.balance_floor,
    };
    let transaction = state.ledger.apply(entry).await?;

    if let Err(err) = state
        .audit
        .record(AuditEntry {
            action: actions::TOKENS_SPENT,
            entity_type: "user",
            entity_id: &user_id.to_string(),
            user_id: Some(user_id),
            old_value: Some(serde_json::json!({ "balance": balance_before })),
            new_value: Some(serde_json::json!({ "balance": transaction.balance_after, "amount": body.amount })),
            metadata: body.idempotency_key.as_deref().map(|key| serde_json::json!({ "idempotency_key": key })),
        })
        .await
    {
        tracing::warn!(error = %err, user_id, "failed to record tokens.spent audit entry");
    }

    if let Some(threshold) = threshold_to_notify(
        transaction.balance_after,
        &state.config.balance_notify_thresholds,
        user.last_balance_notification,
    ) {
        let kind = kind_for_threshold(threshold);
        let notification = Notification::new(user_id, kind, Some(serde_json::json!({ "threshold": threshold })));
        if let Err(err) = state.notifier.notify(notification).await {
            tracing::warn!(error = %err, user_id, "low-balance notification delivery failed");
        }
        if let Err(err) = state.users.set_balance_notification(user_id, Some(threshold as i32)).await {
            tracing::warn!(error = %err, user_id, "failed to persist balance notification bucket");
        }
    }

    Ok(Json(SpendResponse {
        transaction_id: transaction.id,
        tokens_spent: body.amount,
        balance_before,
        balance_after: transaction.balance_after,
    }))
}
