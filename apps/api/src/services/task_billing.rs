//! Task billing coordinator orchestration (C7): wraps admission and the
//! streaming proxy from `creditcore-infra-compute` with the deferred debit
//! and low-balance notification that only make sense with a store and a
//! notifier in hand.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use creditcore_domain_billing::BillingError;
use creditcore_domain_models::TransactionType;
use creditcore_domain_notification::{kind_for_threshold, threshold_to_notify, Notification};
use creditcore_infra_compute::{admit, AdmissionDecision, BotOutputRecord, StreamOutcome};
use creditcore_infra_db::repositories::transactions::LedgerEntry;

use crate::state::AppState;

/// Runs one task end to end: admits, streams, and — only on a successful
/// terminal — debits the captured cost. A task that merely fails or gets
/// cancelled mid-stream is never billed; the coordinator only ever
/// observes a cost once the upstream has confirmed completion.
pub async fn run_task(
    state: &AppState,
    user_id: i64,
    task_path: &str,
    cancel: Arc<AtomicBool>,
    sink: impl FnMut(BotOutputRecord),
) -> Result<StreamOutcome, BillingError> {
    let now = Utc::now();
    let user = state
        .users
        .get(user_id)
        .await
        .map_err(BillingError::from)?
        .ok_or(BillingError::NotFound { entity: "user", id: user_id.to_string() })?;

    if let AdmissionDecision::Refused(err) = admit(&user, now) {
        return Err(err);
    }

    let outcome = state
        .compute
        .stream_task(task_path, cancel, sink)
        .await
        .map_err(|err| BillingError::Payment(err.to_string()))?;

    if !outcome.succeeded() {
        return Ok(outcome);
    }

    let (raw_cost, final_cost, used_fallback) = outcome.cost.finalize(state.config.cost_multiplier);
    if used_fallback {
        tracing::warn!(user_id, task_path, "task completed without a track_cost trailer, billing the fallback cost");
    }

    let description = format!("Task billing ({task_path}), raw cost {raw_cost}");
    let entry = LedgerEntry {
        user_id,
        transaction_type: TransactionType::Spend,
        delta: -final_cost,
        description: &description,
        invoice_id: None,
        metadata: Some(serde_json::json!({ "task_path": task_path, "raw_cost": raw_cost, "used_fallback": used_fallback })),
        idempotency_key: None,
        allow_deferred: true,
        floor: state.config.balance_floor,
    };

    match state.ledger.apply(entry).await {
        Ok(transaction) => {
            if let Some(threshold) =
                threshold_to_notify(transaction.balance_after, &state.config.balance_notify_thresholds, user.last_balance_notification)
            {
                let kind = kind_for_threshold(threshold);
                let notification = Notification::new(user_id, kind, Some(serde_json::json!({ "threshold": threshold })));
                if let Err(err) = state.notifier.notify(notification).await {
                    tracing::warn!(error = %err, user_id, "low-balance notification delivery failed");
                }
                if let Err(err) = state.users.set_balance_notification(user_id, Some(threshold as i32)).await {
                    tracing::warn!(error = %err, user_id, "failed to persist balance notification bucket");
                }
            }
        }
        Err(err) => {
            // The task already ran and was delivered to the user; a
            // billing failure at this point is a collections problem, not
            // a reason to fail the response the chat layer already has in
            // hand. Surfacing it as a metric is the caller's job.
            tracing::error!(error = %err, user_id, task_path, "deferred task debit failed after successful completion");
        }
    }

    Ok(outcome)
}
