//! Payment orchestrator (C5): the webhook state machine of spec.md §4.4.
//!
//! The invoice's `pending -> paid` row-locked transition is the
//! serialization point for "has this webhook already been handled" — once
//! an invoice is no longer pending, a replay is a pure no-op and the ledger
//! is never touched a second time. The crediting mutation that follows runs
//! outside that transaction and leans on the ledger's own idempotency-key
//! dance for its own exactly-once guarantee, since [`crate::state::AppState`]
//! doesn't thread a shared transaction through every repository.

use chrono::Utc;
use creditcore_domain_billing::{
    decide_crediting, next_subscription_end, BillingError, BillingResult, CreditingPlan,
};
use creditcore_domain_models::{actions, PeriodUnit, TransactionType};
use creditcore_domain_notification::{Notification, NotificationKind};
use creditcore_infra_db::repositories::transactions::LedgerEntry;
use creditcore_infra_payment::WebhookPayload;
use rust_decimal::Decimal;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    AlreadyProcessed,
    GatewayRefMismatch,
    InvoiceNotFound,
}

pub async fn process_webhook(state: &AppState, payload: &WebhookPayload) -> BillingResult<WebhookOutcome> {
    let now = Utc::now();

    let mut tx = state.db.pool().begin().await.map_err(|e| BillingError::Payment(e.to_string()))?;
    let invoice = match state.invoices.lock_for_update(&mut tx, payload.invoice_id).await {
        Ok(Some(invoice)) => invoice,
        Ok(None) => {
            tx.rollback().await.ok();
            return Ok(WebhookOutcome::InvoiceNotFound);
        }
        Err(err) => return Err(err.into()),
    };

    if invoice.gateway_ref != payload.inv_id {
        tx.rollback().await.ok();
        return Ok(WebhookOutcome::GatewayRefMismatch);
    }

    if invoice.status != creditcore_domain_models::InvoiceStatus::Pending {
        tx.rollback().await.ok();
        return Ok(WebhookOutcome::AlreadyProcessed);
    }

    let updated = state
        .invoices
        .mark_paid_in_tx(&mut tx, invoice.id, now)
        .await
        .map_err(BillingError::from)?;
    let Some(invoice) = updated else {
        // Lost a race with another webhook delivery between the lock read
        // and this update; treat it the same as an already-processed replay.
        tx.rollback().await.ok();
        return Ok(WebhookOutcome::AlreadyProcessed);
    };
    tx.commit().await.map_err(|e| BillingError::Payment(e.to_string()))?;

    let tariff = state
        .tariffs
        .get(invoice.tariff_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::NotFound { entity: "tariff", id: invoice.tariff_id.to_string() })?;
    let user = state
        .users
        .get(invoice.user_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::NotFound { entity: "user", id: invoice.user_id.to_string() })?;

    let balance_before = user.balance;
    let subscription_end_before = user.subscription_end;
    let subscription_currently_active = user.subscription_active(now);

    let plan = decide_crediting(
        invoice.amount,
        invoice.tokens,
        invoice.subscription_days,
        &tariff,
        subscription_currently_active,
    );

    let mut new_subscription_end = subscription_end_before;
    let description;
    let credit_amount;

    match plan {
        CreditingPlan::Classic { tokens, subscription_days } => {
            credit_amount = Decimal::from(tokens);
            if subscription_days > 0 {
                new_subscription_end =
                    Some(next_subscription_end(subscription_end_before, PeriodUnit::Day, subscription_days, now));
                description = format!("Payment for invoice {}: +{tokens} tokens, +{subscription_days}d subscription", invoice.gateway_ref);
            } else {
                description = format!("Payment for invoice {}: +{tokens} tokens", invoice.gateway_ref);
            }
        }
        CreditingPlan::FeeFirstActivate { fee, remainder, period_unit, period_value } => {
            credit_amount = remainder;
            new_subscription_end = Some(next_subscription_end(None, period_unit, period_value, now));
            description = format!(
                "Payment for invoice {}: subscription fee {fee} activates {period_value:?} {period_unit:?}, remainder {remainder} credited",
                invoice.gateway_ref
            );
        }
        CreditingPlan::WholeAmountToBalance { amount } => {
            credit_amount = amount;
            description = format!("Payment for invoice {}: +{amount} tokens (subscription already active)", invoice.gateway_ref);
        }
    }

    if credit_amount > Decimal::ZERO {
        let entry = LedgerEntry {
            user_id: invoice.user_id,
            transaction_type: TransactionType::Topup,
            delta: credit_amount,
            description: &description,
            invoice_id: Some(invoice.id),
            metadata: Some(json!({ "invoice_id": invoice.id, "gateway_ref": invoice.gateway_ref })),
            idempotency_key: Some(invoice.idempotency_key.as_str()),
            allow_deferred: false,
            floor: state.config.balance_floor,
        };
        state.ledger.apply(entry).await?;
        state.users.set_balance_notification(invoice.user_id, None).await.map_err(BillingError::from)?;
    }

    if new_subscription_end != subscription_end_before {
        state.users.set_subscription_end(invoice.user_id, new_subscription_end).await.map_err(BillingError::from)?;
        state.users.set_subscription_notification(invoice.user_id, None).await.map_err(BillingError::from)?;
    }

    let refreshed = state
        .users
        .get(invoice.user_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::NotFound { entity: "user", id: invoice.user_id.to_string() })?;

    state
        .audit
        .record(creditcore_infra_db::repositories::audit::AuditEntry {
            action: actions::PAYMENT_PROCESSED,
            entity_type: "invoice",
            entity_id: &invoice.id.to_string(),
            user_id: Some(invoice.user_id),
            old_value: Some(json!({ "balance": balance_before, "subscription_end": subscription_end_before })),
            new_value: Some(json!({ "balance": refreshed.balance, "subscription_end": refreshed.subscription_end })),
            metadata: None,
        })
        .await
        .map_err(BillingError::from)?;

    let notification = Notification::new(
        invoice.user_id,
        NotificationKind::PaymentReceived,
        Some(json!({ "invoice_id": invoice.id, "amount": invoice.amount })),
    );
    if let Err(err) = state.notifier.notify(notification).await {
        tracing::warn!(error = %err, user_id = invoice.user_id, "payment-received notification delivery failed");
    }

    Ok(WebhookOutcome::Processed)
}
