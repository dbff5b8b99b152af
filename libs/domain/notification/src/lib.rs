//! User-facing notifications (C8): the message shapes delivered to a user
//! and the pure threshold-dedupe logic behind the balance-warning sweep.
//! Delivery (sending through whatever channel the bot uses) is an adapter
//! concern and lives above this crate.

use chrono::{DateTime, Utc};
use creditcore_domain_models::User;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Balance thresholds (tokens remaining), descending, that trigger a
/// low-balance warning.
pub const DEFAULT_BALANCE_THRESHOLDS: [i64; 4] = [50, 20, 10, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BalanceLow,
    BalanceDepleted,
    SubscriptionExpiringSoon,
    SubscriptionExpired,
    SubscriptionRenewed,
    SubscriptionRenewalFailed,
    PaymentReceived,
    InvoiceCancelled,
}

impl NotificationKind {
    pub fn message_key(&self) -> &'static str {
        match self {
            NotificationKind::BalanceLow => "notif_balance_low",
            NotificationKind::BalanceDepleted => "notif_balance_depleted",
            NotificationKind::SubscriptionExpiringSoon => "notif_subscription_expiring_soon",
            NotificationKind::SubscriptionExpired => "notif_subscription_expired",
            NotificationKind::SubscriptionRenewed => "notif_subscription_renewed",
            NotificationKind::SubscriptionRenewalFailed => "notif_subscription_renewal_failed",
            NotificationKind::PaymentReceived => "notif_payment_received",
            NotificationKind::InvoiceCancelled => "notif_invoice_cancelled",
        }
    }
}

/// One outbound message to a user. `id` lets a delivery adapter dedupe
/// retries without re-deriving the dedupe key itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: i64, kind: NotificationKind, metadata: Option<serde_json::Value>) -> Self {
        Self { id: Uuid::new_v4(), user_id, kind, metadata, created_at: Utc::now() }
    }
}

/// Delivers a [`Notification`] through whatever channel the deployment
/// uses. Implemented by an adapter; this crate only defines the contract.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifierError>;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifierError(pub String);

/// The smallest configured balance threshold that should fire right now,
/// mirroring the subscription bucket dedupe: a threshold only fires if it
/// is strictly smaller than whatever was last sent, so crossing 100 then
/// 20 then 0 sends exactly three warnings, not one per sweep.
pub fn threshold_to_notify(
    balance_after: Decimal,
    thresholds: &[i64],
    last_notified: Option<i64>,
) -> Option<i64> {
    thresholds
        .iter()
        .copied()
        .filter(|&threshold| {
            balance_after <= Decimal::from(threshold) && last_notified.map_or(true, |sent| threshold < sent)
        })
        .min()
}

/// Whether a user should receive the paired `BalanceLow` / `BalanceDepleted`
/// notification kind for a crossed threshold.
pub fn kind_for_threshold(threshold: i64) -> NotificationKind {
    if threshold <= 0 {
        NotificationKind::BalanceDepleted
    } else {
        NotificationKind::BalanceLow
    }
}

pub fn balance_warning_for(
    user: &User,
    thresholds: &[i64],
) -> Option<(NotificationKind, i64)> {
    threshold_to_notify(user.balance, thresholds, user.last_balance_notification)
        .map(|threshold| (kind_for_threshold(threshold), threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_each_threshold_fires_once() {
        let thresholds = DEFAULT_BALANCE_THRESHOLDS;
        let mut last_sent = None;

        let first = threshold_to_notify(Decimal::new(45, 0), &thresholds, last_sent);
        assert_eq!(first, Some(50));
        last_sent = first;

        assert_eq!(threshold_to_notify(Decimal::new(40, 0), &thresholds, last_sent), None);

        let second = threshold_to_notify(Decimal::new(18, 0), &thresholds, last_sent);
        assert_eq!(second, Some(20));
        last_sent = second;

        let third = threshold_to_notify(Decimal::new(9, 0), &thresholds, last_sent);
        assert_eq!(third, Some(10));
        last_sent = third;

        let fourth = threshold_to_notify(Decimal::new(4, 0), &thresholds, last_sent);
        assert_eq!(fourth, Some(5));
        last_sent = fourth;

        assert_eq!(threshold_to_notify(Decimal::new(4, 0), &thresholds, last_sent), None);
    }

    #[test]
    fn a_credit_resets_the_dedupe_cycle() {
        let thresholds = DEFAULT_BALANCE_THRESHOLDS;
        let after_first_cycle = Some(5);
        // A credit resets `last_notified` to `None`; the same descent fires again.
        assert_eq!(threshold_to_notify(Decimal::new(45, 0), &thresholds, None), Some(50));
        assert_eq!(threshold_to_notify(Decimal::new(45, 0), &thresholds, after_first_cycle), None);
    }

    #[test]
    fn zero_threshold_maps_to_depleted_kind() {
        assert_eq!(kind_for_threshold(0), NotificationKind::BalanceDepleted);
        assert_eq!(kind_for_threshold(5), NotificationKind::BalanceLow);
    }
}
