//! Pure domain logic for the billing core: ledger guards, the promo
//! evaluator, invoice idempotency and subscription arithmetic. Nothing in
//! this crate touches a connection or a clock other than what it's
//! handed — every suspension point lives one layer up, in
//! `creditcore-infra-db`.

pub mod errors;
pub mod invoice;
pub mod ledger;
pub mod payment;
pub mod promo;
pub mod subscription;

pub use errors::{BillingError, BillingResult};
pub use invoice::{default_expiry, derive_idempotency_key, time_window, PreviewDto, DEFAULT_INVOICE_TTL_HOURS};
pub use ledger::{apply_credit, apply_debit, cas_backoff, guard_credit, guard_debit, DEFAULT_BALANCE_FLOOR, MAX_CAS_ATTEMPTS};
pub use payment::{decide_crediting, CreditingPlan};
pub use promo::{apply_discount, validate as validate_promo, DiscountResult, PromoContext};
pub use subscription::{
    advance_period, bucket_to_notify, next_subscription_end, status as subscription_status,
    SubscriptionState, SubscriptionStatus, DEFAULT_NOTIFY_DAYS,
};
