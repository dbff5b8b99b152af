//! Crediting-shape decision for a paid invoice (C5's pure half). The
//! orchestrator in `apps/api` reads this and then executes the plan against
//! the ledger and subscription repositories within one unit of work;
//! nothing here touches a connection.

use creditcore_domain_models::{PeriodUnit, Tariff};
use rust_decimal::Decimal;

/// What a paid invoice's amount should do to the user's balance and
/// subscription, decided from the tariff rather than guessed from the
/// amount itself.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditingPlan {
    /// Credit `tokens` to the balance; if `subscription_days > 0`, extend
    /// `subscription_end` by that many days.
    Classic { tokens: i64, subscription_days: i32 },
    /// The user's subscription is not currently active: `fee` tokens (1 RUB
    /// = 1 token) activate a fresh period of `(period_unit, period_value)`
    /// from now, and `remainder` is credited to the balance.
    FeeFirstActivate { fee: Decimal, remainder: Decimal, period_unit: PeriodUnit, period_value: i32 },
    /// The subscription is already active: the whole payment amount is
    /// ordinary balance credit, no subscription change.
    WholeAmountToBalance { amount: Decimal },
}

/// Picks the crediting shape for a paid invoice. A tariff that carries a
/// `subscription_fee > 0` is a fee-first (subscription) tariff; a tariff
/// with `subscription_fee == 0` is a classic prepaid-token tariff, even
/// when it also grants `subscription_days` as a bundled add-on.
pub fn decide_crediting(
    invoice_amount: Decimal,
    invoice_tokens: i64,
    invoice_subscription_days: i32,
    tariff: &Tariff,
    subscription_currently_active: bool,
) -> CreditingPlan {
    if tariff.subscription_fee > 0 {
        if subscription_currently_active {
            CreditingPlan::WholeAmountToBalance { amount: invoice_amount }
        } else {
            let fee = Decimal::from(tariff.subscription_fee);
            CreditingPlan::FeeFirstActivate {
                fee,
                remainder: invoice_amount - fee,
                period_unit: tariff.period_unit,
                period_value: tariff.period_value,
            }
        }
    } else {
        CreditingPlan::Classic { tokens: invoice_tokens, subscription_days: invoice_subscription_days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditcore_domain_models::PeriodUnit;
    use uuid::Uuid;

    fn sample_tariff(subscription_fee: i64) -> Tariff {
        Tariff {
            id: Uuid::new_v4(),
            slug: "pro".into(),
            name: "Pro".into(),
            description: None,
            price: Decimal::new(20000, 2),
            tokens: 1000,
            period_unit: PeriodUnit::Day,
            period_value: 30,
            subscription_fee,
            min_payment: Decimal::ONE,
            is_active: true,
            sort_order: 0,
            version: 1,
        }
    }

    #[test]
    fn classic_tariff_credits_tokens_and_extends_by_invoice_days() {
        let tariff = sample_tariff(0);
        let plan = decide_crediting(Decimal::new(20000, 2), 1000, 30, &tariff, false);
        assert_eq!(plan, CreditingPlan::Classic { tokens: 1000, subscription_days: 30 });
    }

    #[test]
    fn fee_first_tariff_activates_and_credits_remainder_when_inactive() {
        let tariff = sample_tariff(100);
        let plan = decide_crediting(Decimal::new(200, 0), 0, 0, &tariff, false);
        assert_eq!(
            plan,
            CreditingPlan::FeeFirstActivate {
                fee: Decimal::new(100, 0),
                remainder: Decimal::new(100, 0),
                period_unit: PeriodUnit::Day,
                period_value: 30,
            }
        );
    }

    #[test]
    fn fee_first_tariff_credits_whole_amount_when_already_active() {
        let tariff = sample_tariff(100);
        let plan = decide_crediting(Decimal::new(200, 0), 0, 0, &tariff, true);
        assert_eq!(plan, CreditingPlan::WholeAmountToBalance { amount: Decimal::new(200, 0) });
    }
}
