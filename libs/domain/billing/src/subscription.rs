//! Subscription engine (C6): period arithmetic, the read model, and the
//! pure expiry-notification bucket decision. The auto-renewal and expiry
//! sweeps themselves touch the store and the ledger, so they live in
//! `apps/api`'s scheduler, built on top of these helpers.

use chrono::{DateTime, Months, Utc};
use creditcore_domain_models::{PeriodUnit, User};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default "days before expiry" buckets, descending.
pub const DEFAULT_NOTIFY_DAYS: [i32; 3] = [3, 1, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    None,
    Expired,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub state: SubscriptionState,
    pub end: Option<DateTime<Utc>>,
    pub days_left: Option<i64>,
    pub auto_renew: bool,
    pub renewal_price: i64,
    pub can_auto_renew: bool,
}

/// Builds the subscription read model. `renewal_fee` is the owning
/// tariff's `subscription_fee`, looked up by the caller.
pub fn status(user: &User, renewal_fee: i64, now: DateTime<Utc>) -> SubscriptionStatus {
    let state = match user.subscription_end {
        Some(end) if end > now => SubscriptionState::Active,
        Some(_) => SubscriptionState::Expired,
        None => SubscriptionState::None,
    };
    SubscriptionStatus {
        state,
        end: user.subscription_end,
        days_left: user.days_left(now),
        auto_renew: user.auto_renew,
        renewal_price: renewal_fee,
        can_auto_renew: user.balance >= Decimal::from(renewal_fee),
    }
}

/// Advances a moment by a tariff's `(period_unit, period_value)`.
pub fn advance_period(base: DateTime<Utc>, unit: PeriodUnit, value: i32) -> DateTime<Utc> {
    match unit {
        PeriodUnit::Hour => base + chrono::Duration::hours(value as i64),
        PeriodUnit::Day => base + chrono::Duration::days(value as i64),
        PeriodUnit::Month => base
            .checked_add_months(Months::new(value.max(0) as u32))
            .unwrap_or(base),
    }
}

/// The next `subscription_end`: additive from the current end when still in
/// the future, otherwise measured from `now`.
pub fn next_subscription_end(
    current_end: Option<DateTime<Utc>>,
    unit: PeriodUnit,
    value: i32,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match current_end {
        Some(end) if end > now => end,
        _ => now,
    };
    advance_period(base, unit, value)
}

/// The smallest configured bucket that should fire a notification right
/// now, or `None` if nothing has newly crossed. `last_sent` is the smallest
/// bucket already sent this cycle: a bucket only fires if it is strictly
/// smaller than whatever was last sent.
pub fn bucket_to_notify(days_left: i64, buckets: &[i32], last_sent: Option<i32>) -> Option<i32> {
    buckets
        .iter()
        .copied()
        .filter(|&bucket| days_left <= bucket as i64 && last_sent.map_or(true, |sent| bucket < sent))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_dedupe_fires_each_bucket_exactly_once() {
        let buckets = DEFAULT_NOTIFY_DAYS;
        let mut last_sent = None;

        let first = bucket_to_notify(2, &buckets, last_sent);
        assert_eq!(first, Some(3));
        last_sent = first;

        // Same day again: bucket 3 must not refire.
        assert_eq!(bucket_to_notify(2, &buckets, last_sent), None);

        let second = bucket_to_notify(1, &buckets, last_sent);
        assert_eq!(second, Some(1));
        last_sent = second;

        let third = bucket_to_notify(0, &buckets, last_sent);
        assert_eq!(third, Some(0));
        last_sent = third;

        assert_eq!(bucket_to_notify(0, &buckets, last_sent), None);
    }

    #[test]
    fn month_period_advances_calendar_month() {
        use chrono::{Datelike, TimeZone};
        let base = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let advanced = advance_period(base, PeriodUnit::Month, 1);
        assert_eq!(advanced.month(), 2);
        let _ = advanced.day();
    }
}
