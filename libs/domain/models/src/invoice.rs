use crate::enums::InvoiceStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bill issued for a tariff purchase. `gateway_ref` is the monotone
/// integer correlator the payment provider requires alongside the UUID key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub gateway_ref: i64,
    pub user_id: i64,
    pub tariff_id: Uuid,
    pub promo_id: Option<Uuid>,
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub tokens: i64,
    pub subscription_days: i32,
    pub status: InvoiceStatus,
    pub idempotency_key: String,
    pub payment_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Pending && self.expires_at < now
    }
}
