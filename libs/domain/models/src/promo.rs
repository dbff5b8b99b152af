use crate::enums::DiscountType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A promo code. The natural key `code` is compared case-insensitively —
/// callers should normalize to uppercase before querying
/// (`creditcore-infra-db` does this at the repository boundary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub uses_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub tariff_id: Option<Uuid>,
    pub is_active: bool,
}

/// Records that `tariff` was activated by `promo` for `user` — the unique
/// `(user, tariff)` key enforces single-use-per-tariff-per-user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PromoActivation {
    pub user_id: i64,
    pub tariff_id: Uuid,
    pub promo_id: Uuid,
    pub tokens_credited: i64,
    pub subscription_days_added: i32,
    pub created_at: DateTime<Utc>,
}
