//! Ledger engine (C2): the pure guards every balance mutation must pass,
//! and the retry policy for the optimistic-concurrency loop around
//! `users.balance_version`. The loop itself — read, guard, `UPDATE ...
//! WHERE balance_version = :v`, retry on zero rows — lives in
//! `creditcore-infra-db` since it needs a connection.

use creditcore_domain_models::User;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::errors::{BillingError, BillingResult};

/// Default maximum overdraft magnitude: a deferred debit may drive a
/// balance down to `-DEFAULT_BALANCE_FLOOR` but never past it. Deployments
/// read their actual floor from configuration; this is only the fallback.
pub const DEFAULT_BALANCE_FLOOR: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Attempts of the balance-version compare-and-swap loop before giving up
/// with [`BillingError::ConcurrentModification`].
pub const MAX_CAS_ATTEMPTS: u32 = 3;

/// Backoff before CAS attempt `n` (1-indexed): 10ms, 40ms, 160ms.
pub fn cas_backoff(attempt: u32) -> Duration {
    Duration::from_millis(10u64.saturating_mul(4u64.saturating_pow(attempt.saturating_sub(1))))
}

/// Guards a debit of `amount` tokens against a user's current state and the
/// balance it would leave behind. A plain (non-deferred) debit — the token
/// API's `spend` call — may never cross into negative territory. A deferred
/// debit — settling an already-delivered task — may drive the balance
/// negative but never past `-floor`.
pub fn guard_debit(user: &User, amount: Decimal, allow_deferred: bool, floor: Decimal) -> BillingResult<()> {
    if user.is_blocked {
        return Err(BillingError::UserBlocked);
    }
    if amount <= Decimal::ZERO {
        return Err(BillingError::Validation("debit amount must be positive".into()));
    }
    let resulting_balance = user.balance - amount;
    let hard_floor = if allow_deferred { -floor } else { Decimal::ZERO };
    if resulting_balance < hard_floor {
        return Err(BillingError::InsufficientBalance { required: amount, available: user.balance });
    }
    Ok(())
}

/// Guards a credit (top-up, refund, bonus) — the only universal rule is
/// that blocked accounts still accrue; only spending is gated by the block.
pub fn guard_credit(amount: Decimal) -> BillingResult<()> {
    if amount <= Decimal::ZERO {
        return Err(BillingError::Validation("credit amount must be positive".into()));
    }
    Ok(())
}

/// The balance a debit would leave behind, clamped at the floor only for
/// the deferred-debit path; the caller is responsible for persisting it
/// through the version-guarded update.
pub fn apply_debit(balance: Decimal, amount: Decimal) -> Decimal {
    balance - amount
}

pub fn apply_credit(balance: Decimal, amount: Decimal) -> Decimal {
    balance + amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user(balance: Decimal, is_blocked: bool) -> User {
        User {
            id: 1,
            display_name: None,
            username: None,
            balance,
            balance_version: 0,
            subscription_end: None,
            is_blocked,
            auto_renew: false,
            last_subscription_notification: None,
            last_balance_notification: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn blocked_user_cannot_spend() {
        let user = sample_user(Decimal::new(100, 0), true);
        let err = guard_debit(&user, Decimal::new(10, 0), false, DEFAULT_BALANCE_FLOOR).unwrap_err();
        assert_eq!(err.code(), "user_blocked");
    }

    #[test]
    fn insufficient_balance_is_rejected_without_deferral() {
        let user = sample_user(Decimal::new(5, 0), false);
        let err = guard_debit(&user, Decimal::new(10, 0), false, DEFAULT_BALANCE_FLOOR).unwrap_err();
        assert_eq!(err.code(), "insufficient_balance");
    }

    #[test]
    fn deferred_debit_allows_driving_balance_negative() {
        let user = sample_user(Decimal::new(5, 0), false);
        assert!(guard_debit(&user, Decimal::new(10, 0), true, DEFAULT_BALANCE_FLOOR).is_ok());
        assert_eq!(apply_debit(user.balance, Decimal::new(10, 0)), Decimal::new(-5, 0));
    }

    #[test]
    fn deferred_debit_still_allows_an_already_negative_balance_above_the_floor() {
        let user = sample_user(Decimal::new(-1, 0), false);
        assert!(guard_debit(&user, Decimal::new(10, 0), true, DEFAULT_BALANCE_FLOOR).is_ok());
    }

    #[test]
    fn deferred_debit_refuses_to_cross_the_floor() {
        let user = sample_user(Decimal::new(-995, 0), false);
        let err = guard_debit(&user, Decimal::new(10, 0), true, DEFAULT_BALANCE_FLOOR).unwrap_err();
        assert_eq!(err.code(), "insufficient_balance");
    }

    #[test]
    fn plain_debit_refuses_to_cross_into_negative_even_within_the_floor() {
        let user = sample_user(Decimal::new(5, 0), false);
        let err = guard_debit(&user, Decimal::new(10, 0), false, DEFAULT_BALANCE_FLOOR).unwrap_err();
        assert_eq!(err.code(), "insufficient_balance");
    }

    #[test]
    fn cas_backoff_grows_fourfold_per_attempt() {
        assert_eq!(cas_backoff(1), Duration::from_millis(10));
        assert_eq!(cas_backoff(2), Duration::from_millis(40));
        assert_eq!(cas_backoff(3), Duration::from_millis(160));
    }
}
