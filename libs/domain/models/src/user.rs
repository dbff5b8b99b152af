use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An end user of the chat channel.
/// `id` is externally assigned (the chat platform's own user id), not
/// generated here — the row is upserted on first contact. `balance` is
/// signed and may sit as low as `-FLOOR`; `balance_version`
/// backs the optimistic-concurrency guard in the ledger engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub balance: rust_decimal::Decimal,
    pub balance_version: i64,
    pub subscription_end: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub auto_renew: bool,
    /// Smallest notification bucket (days-before-expiry) already sent this
    /// subscription cycle, or `None` if no bucket has fired yet.
    pub last_subscription_notification: Option<i32>,
    /// Low-balance threshold last notified for, or `None` after a credit
    /// resets it.
    pub last_balance_notification: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `(created_at, subscription_end]` is active iff `subscription_end > now`.
    pub fn subscription_active(&self, now: DateTime<Utc>) -> bool {
        self.subscription_end.map(|end| end > now).unwrap_or(false)
    }

    pub fn days_left(&self, now: DateTime<Utc>) -> Option<i64> {
        self.subscription_end.map(|end| (end - now).num_days())
    }
}
