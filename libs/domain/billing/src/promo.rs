//! Promo evaluator (C3): validity rules and discount calculus, both pure.
//! Usage accounting (`uses_count` increment) touches the store and lives in
//! `creditcore-infra-db`.

use chrono::{DateTime, Utc};
use creditcore_domain_models::{DiscountType, PromoCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BillingError, BillingResult};

/// Inputs the evaluator needs beyond the promo row itself.
#[derive(Debug, Clone, Copy)]
pub struct PromoContext {
    pub now: DateTime<Utc>,
    pub tariff_id: Option<Uuid>,
    /// Whether a `PromoActivation(user, tariff)` already exists for this
    /// user/tariff pair — looked up by the caller, since only the caller
    /// knows the user.
    pub already_activated_for_tariff: bool,
}

/// Validates a promo code in order — first failure wins. `promo` is `None`
/// when the lookup found nothing.
pub fn validate(promo: Option<&PromoCode>, ctx: PromoContext) -> BillingResult<()> {
    let promo = promo.ok_or_else(|| BillingError::Validation("promo code not found".into()))?;

    if !promo.is_active {
        return Err(BillingError::Validation("promo code is not active".into()));
    }
    if promo.valid_from > ctx.now {
        return Err(BillingError::Validation("promo code is not yet valid".into()));
    }
    if let Some(until) = promo.valid_until {
        if ctx.now > until {
            return Err(BillingError::Validation("promo code has expired".into()));
        }
    }
    if let Some(max_uses) = promo.max_uses {
        if promo.uses_count >= max_uses {
            return Err(BillingError::Validation("promo code has reached its usage limit".into()));
        }
    }
    if let Some(restricted_tariff) = promo.tariff_id {
        if Some(restricted_tariff) != ctx.tariff_id {
            return Err(BillingError::Validation("promo code does not apply to this tariff".into()));
        }
    }
    if ctx.already_activated_for_tariff {
        return Err(BillingError::Validation(
            "this tariff has already been activated with a promo by this user".into(),
        ));
    }
    Ok(())
}

/// Result of applying a valid promo to an `original_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountResult {
    pub original: Decimal,
    pub final_amount: Decimal,
    pub discount_amount: Decimal,
    pub bonus_tokens: i64,
    pub description: String,
}

/// Discount calculus. Assumes `promo` already passed [`validate`].
pub fn apply_discount(promo: &PromoCode, original: Decimal) -> DiscountResult {
    match promo.discount_type {
        DiscountType::Percent => {
            let fraction = Decimal::ONE - (promo.discount_value / Decimal::ONE_HUNDRED);
            let final_amount = (original * fraction).round_dp(2);
            DiscountResult {
                original,
                final_amount,
                discount_amount: original - final_amount,
                bonus_tokens: 0,
                description: format!("Скидка {}%", promo.discount_value.normalize()),
            }
        }
        DiscountType::Fixed => {
            let candidate = (original - promo.discount_value).round_dp(2);
            let final_amount = candidate.max(Decimal::ONE);
            DiscountResult {
                original,
                final_amount,
                discount_amount: original - final_amount,
                bonus_tokens: 0,
                description: format!("Скидка {} ₽", promo.discount_value.normalize()),
            }
        }
        DiscountType::BonusTokens => {
            let bonus_tokens = promo.discount_value.trunc().try_into().unwrap_or(0);
            DiscountResult {
                original,
                final_amount: original,
                discount_amount: Decimal::ZERO,
                bonus_tokens,
                description: format!("+{} бонусных токенов", bonus_tokens),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use creditcore_domain_models::DiscountType;

    fn sample_promo(discount_type: DiscountType, value: Decimal) -> PromoCode {
        PromoCode {
            id: Uuid::new_v4(),
            code: "SALE20".into(),
            discount_type,
            discount_value: value,
            max_uses: None,
            uses_count: 0,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            tariff_id: None,
            is_active: true,
        }
    }

    #[test]
    fn percent_discount_rounds_to_two_places() {
        let promo = sample_promo(DiscountType::Percent, Decimal::new(20, 0));
        let result = apply_discount(&promo, Decimal::new(500, 0));
        assert_eq!(result.final_amount, Decimal::new(400, 0));
        assert_eq!(result.discount_amount, Decimal::new(100, 0));
        assert_eq!(result.bonus_tokens, 0);
    }

    #[test]
    fn fixed_discount_floors_at_one_ruble() {
        let promo = sample_promo(DiscountType::Fixed, Decimal::new(10000, 0));
        let result = apply_discount(&promo, Decimal::new(50, 0));
        assert_eq!(result.final_amount, Decimal::ONE);
    }

    #[test]
    fn bonus_tokens_do_not_change_price() {
        let promo = sample_promo(DiscountType::BonusTokens, Decimal::new(50, 0));
        let result = apply_discount(&promo, Decimal::new(300, 0));
        assert_eq!(result.final_amount, Decimal::new(300, 0));
        assert_eq!(result.bonus_tokens, 50);
    }

    #[test]
    fn expired_promo_is_rejected() {
        let mut promo = sample_promo(DiscountType::Percent, Decimal::new(10, 0));
        promo.valid_until = Some(Utc::now() - Duration::days(1));
        let err = validate(
            Some(&promo),
            PromoContext { now: Utc::now(), tariff_id: None, already_activated_for_tariff: false },
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn reused_promo_for_same_tariff_is_rejected() {
        let promo = sample_promo(DiscountType::Percent, Decimal::new(10, 0));
        let err = validate(
            Some(&promo),
            PromoContext { now: Utc::now(), tariff_id: None, already_activated_for_tariff: true },
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
