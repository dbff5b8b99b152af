//! Subscription engine (C6): the read model plus the three sweeps the
//! scheduler drives — expiry notifications, auto-renewal, and the purely
//! observational "already expired" notice (spec.md §4.5).

use chrono::{DateTime, Duration, Utc};
use creditcore_domain_billing::{bucket_to_notify, next_subscription_end, subscription_status, BillingError};
use creditcore_domain_models::{actions, PeriodUnit, TransactionType};
use creditcore_domain_notification::{Notification, NotificationKind};
use creditcore_infra_db::repositories::audit::AuditEntry;
use creditcore_infra_db::repositories::transactions::LedgerEntry;
use rust_decimal::Decimal;
use serde_json::json;

use crate::state::AppState;

/// Sentinel `last_subscription_notification` value marking "the
/// already-expired notice has fired this cycle" — distinct from any real
/// day-bucket so it never suppresses (or gets suppressed by) a legitimate
/// upcoming-expiry bucket.
const EXPIRED_NOTIFIED_SENTINEL: i32 = -1;

/// Sentinel marking "a renewal-failed notice already fired for the
/// current due period" — distinct from [`EXPIRED_NOTIFIED_SENTINEL`] and
/// from any real day-bucket. Cleared the moment the sweep actually
/// renews the subscription (`set_subscription_notification(.., None)` on
/// the success branch), so a later sweep after the user tops up notifies
/// normally again instead of staying silent forever.
const RENEWAL_FAILED_NOTIFIED_SENTINEL: i32 = -2;

pub async fn status(state: &AppState, user_id: i64, now: DateTime<Utc>) -> Result<creditcore_domain_billing::SubscriptionStatus, BillingError> {
    let user = state
        .users
        .get(user_id)
        .await
        .map_err(BillingError::from)?
        .ok_or(BillingError::NotFound { entity: "user", id: user_id.to_string() })?;
    Ok(subscription_status(&user, state.config.subscription_renewal_price, now))
}

/// Tiered expiry-notification sweep: every user whose subscription lapses
/// within the widest configured bucket gets at most one notification per
/// bucket crossing, tracked by `last_subscription_notification`.
pub async fn notify_expiring_sweep(state: &AppState, now: DateTime<Utc>) -> Result<usize, BillingError> {
    let widest_bucket = state.config.subscription_notify_days.iter().copied().max().unwrap_or(0);
    let candidates = state
        .users
        .list_subscriptions_ending_within(now, widest_bucket as i64)
        .await
        .map_err(BillingError::from)?;

    let mut sent = 0usize;
    for user in candidates {
        let Some(days_left) = user.days_left(now) else { continue };
        let Some(bucket) = bucket_to_notify(days_left, &state.config.subscription_notify_days, user.last_subscription_notification) else {
            continue;
        };

        let notification = Notification::new(
            user.id,
            NotificationKind::SubscriptionExpiringSoon,
            Some(json!({ "days_left": bucket })),
        );
        if let Err(err) = state.notifier.notify(notification).await {
            tracing::warn!(error = %err, user_id = user.id, "subscription-expiring notification delivery failed");
        }
        state
            .users
            .set_subscription_notification(user.id, Some(bucket))
            .await
            .map_err(BillingError::from)?;
        sent += 1;
    }
    Ok(sent)
}

/// Auto-renewal sweep: debits the renewal price from every due,
/// opted-in user with sufficient balance; everyone else gets a
/// `renewal_failed` notice, at most once per day (a successful sweep
/// always clears the dedupe sentinel, so a retry next interval is the
/// natural re-check, not a resend within the same sweep).
pub async fn auto_renew_sweep(state: &AppState, now: DateTime<Utc>) -> Result<(usize, usize), BillingError> {
    let due = state.users.list_auto_renew_due(now, Duration::days(1)).await.map_err(BillingError::from)?;
    let fee = Decimal::from(state.config.subscription_renewal_price);

    let mut renewed = 0usize;
    let mut failed = 0usize;
    for candidate in due {
        let mut tx = state.db.pool().begin().await.map_err(|e| BillingError::Payment(e.to_string()))?;
        let Some(user) = state.users.lock_for_update(&mut tx, candidate.id).await.map_err(BillingError::from)? else {
            tx.rollback().await.ok();
            continue;
        };

        if user.balance < fee {
            tx.rollback().await.ok();
            failed += 1;
            if user.last_subscription_notification == Some(RENEWAL_FAILED_NOTIFIED_SENTINEL) {
                continue;
            }

            let notification = Notification::new(
                user.id,
                NotificationKind::SubscriptionRenewalFailed,
                Some(json!({ "required": state.config.subscription_renewal_price, "available": user.balance })),
            );
            if let Err(err) = state.notifier.notify(notification).await {
                tracing::warn!(error = %err, user_id = user.id, "renewal-failed notification delivery failed");
            }
            state
                .users
                .set_subscription_notification(user.id, Some(RENEWAL_FAILED_NOTIFIED_SENTINEL))
                .await
                .map_err(BillingError::from)?;
            state
                .audit
                .record(AuditEntry {
                    action: actions::SUBSCRIPTION_RENEWAL_FAILED,
                    entity_type: "user",
                    entity_id: &user.id.to_string(),
                    user_id: Some(user.id),
                    old_value: None,
                    new_value: Some(json!({ "balance": user.balance, "required": state.config.subscription_renewal_price })),
                    metadata: None,
                })
                .await
                .map_err(BillingError::from)?;
            continue;
        }

        let new_end = next_subscription_end(user.subscription_end, PeriodUnit::Day, state.config.subscription_renewal_days, now);

        // The conditional advance happens inside the same transaction as
        // the row lock, so a concurrent tick that raced past the lock read
        // finds `subscription_end` already moved and bows out below instead
        // of renewing (and debiting) this user a second time.
        let advanced = state
            .users
            .advance_subscription_in_tx(&mut tx, user.id, user.subscription_end, new_end)
            .await
            .map_err(BillingError::from)?;
        if !advanced {
            tx.rollback().await.ok();
            continue;
        }
        tx.commit().await.map_err(|e| BillingError::Payment(e.to_string()))?;

        let description = format!("Auto-renewal subscription ({} days)", state.config.subscription_renewal_days);
        let entry = LedgerEntry {
            user_id: user.id,
            transaction_type: TransactionType::Subscription,
            delta: -fee,
            description: &description,
            invoice_id: None,
            metadata: None,
            idempotency_key: None,
            allow_deferred: false,
            floor: state.config.balance_floor,
        };
        let transaction = state.ledger.apply(entry).await?;

        state.users.set_subscription_notification(user.id, None).await.map_err(BillingError::from)?;

        let notification = Notification::new(
            user.id,
            NotificationKind::SubscriptionRenewed,
            Some(json!({ "tokens_spent": state.config.subscription_renewal_price, "balance_after": transaction.balance_after })),
        );
        if let Err(err) = state.notifier.notify(notification).await {
            tracing::warn!(error = %err, user_id = user.id, "renewal-success notification delivery failed");
        }
        state
            .audit
            .record(AuditEntry {
                action: actions::SUBSCRIPTION_RENEWED,
                entity_type: "user",
                entity_id: &user.id.to_string(),
                user_id: Some(user.id),
                old_value: Some(json!({ "subscription_end": user.subscription_end })),
                new_value: Some(json!({ "subscription_end": new_end, "balance": transaction.balance_after })),
                metadata: None,
            })
            .await
            .map_err(BillingError::from)?;
        renewed += 1;
    }
    Ok((renewed, failed))
}

/// Users whose subscription has lapsed get exactly one `subscription_expired`
/// notice; `subscription_end` itself is never touched here — expiry is a
/// pure moment-in-time read, not a state this engine mutates.
pub async fn notify_expired_sweep(state: &AppState, now: DateTime<Utc>) -> Result<usize, BillingError> {
    let lapsed = state.users.list_subscriptions_expired_before(now).await.map_err(BillingError::from)?;

    let mut sent = 0usize;
    for user in lapsed {
        if user.last_subscription_notification == Some(EXPIRED_NOTIFIED_SENTINEL) {
            continue;
        }
        let notification = Notification::new(user.id, NotificationKind::SubscriptionExpired, None);
        if let Err(err) = state.notifier.notify(notification).await {
            tracing::warn!(error = %err, user_id = user.id, "subscription-expired notification delivery failed");
        }
        state
            .users
            .set_subscription_notification(user.id, Some(EXPIRED_NOTIFIED_SENTINEL))
            .await
            .map_err(BillingError::from)?;
        sent += 1;
    }
    Ok(sent)
}
