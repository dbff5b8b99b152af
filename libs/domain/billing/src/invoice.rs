//! Invoice service (C4): idempotency-key derivation, TTL math and the
//! preview DTO. Issuing, cancelling and expiring invoices touches the
//! store and lives in `creditcore-infra-db`.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::promo::DiscountResult;

pub const DEFAULT_INVOICE_TTL_HOURS: i64 = 24;

/// Rounds `now` down to the 60-minute boundary used by the idempotency key:
/// repeated "buy" clicks within the same hour collapse onto one invoice; a
/// later attempt in the next hour gets a fresh one.
pub fn time_window(now: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = now.date_naive().and_hms_opt(now.hour(), 0, 0).expect("valid hour");
    Utc.from_utc_datetime(&truncated)
}

/// `SHA-256(user ∥ tariff ∥ promo ∥ time_window)[0:16]`, hex-encoded.
pub fn derive_idempotency_key(
    user_id: i64,
    tariff_id: Uuid,
    promo_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_le_bytes());
    hasher.update(tariff_id.as_bytes());
    if let Some(promo_id) = promo_id {
        hasher.update(promo_id.as_bytes());
    }
    hasher.update(time_window(now).timestamp().to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8]) // 8 bytes -> 16 hex chars
}

pub fn default_expiry(now: DateTime<Utc>, ttl_hours: i64) -> DateTime<Utc> {
    now + Duration::hours(ttl_hours)
}

/// Pure, side-effect-free preview of what committing an invoice would yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewDto {
    pub tariff_id: Uuid,
    pub original_amount: Decimal,
    pub final_amount: Decimal,
    pub discount_amount: Decimal,
    pub tokens: i64,
    pub bonus_tokens: i64,
    pub subscription_days: i32,
    pub promo_description: Option<String>,
}

impl PreviewDto {
    pub fn without_promo(tariff_id: Uuid, price: Decimal, tokens: i64, subscription_days: i32) -> Self {
        Self {
            tariff_id,
            original_amount: price,
            final_amount: price,
            discount_amount: Decimal::ZERO,
            tokens,
            bonus_tokens: 0,
            subscription_days,
            promo_description: None,
        }
    }

    pub fn with_discount(
        tariff_id: Uuid,
        tokens: i64,
        subscription_days: i32,
        discount: DiscountResult,
    ) -> Self {
        Self {
            tariff_id,
            original_amount: discount.original,
            final_amount: discount.final_amount,
            discount_amount: discount.discount_amount,
            tokens: tokens + discount.bonus_tokens,
            bonus_tokens: discount.bonus_tokens,
            subscription_days,
            promo_description: Some(discount.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_within_the_hour() {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 10, 15, 0).unwrap();
        let later_same_hour = Utc.with_ymd_and_hms(2026, 1, 1, 10, 59, 0).unwrap();
        let tariff = Uuid::new_v4();
        let a = derive_idempotency_key(1001, tariff, None, base);
        let b = derive_idempotency_key(1001, tariff, None, later_same_hour);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn idempotency_key_changes_across_hour_boundary() {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 10, 59, 0).unwrap();
        let next_hour = Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap();
        let tariff = Uuid::new_v4();
        let a = derive_idempotency_key(1001, tariff, None, base);
        let b = derive_idempotency_key(1001, tariff, None, next_hour);
        assert_ne!(a, b);
    }
}
