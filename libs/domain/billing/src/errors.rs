use rust_decimal::Decimal;
use thiserror::Error;

/// The error taxonomy shared by every layer above the store.
/// `ConcurrentModification` is what the optimistic-concurrency loop
/// surfaces once it exhausts its retries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BillingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("subscription expired")]
    SubscriptionExpired,

    #[error("user is blocked")]
    UserBlocked,

    #[error("concurrent modification, retry the operation")]
    ConcurrentModification,

    #[error("duplicate request, idempotency key already applied")]
    Duplicate,

    #[error("payment error: {0}")]
    Payment(String),
}

impl BillingError {
    /// The stable string the Token API envelope reports.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::NotFound { .. } => "not_found",
            BillingError::Validation(_) => "validation_error",
            BillingError::InsufficientBalance { .. } => "insufficient_balance",
            BillingError::SubscriptionExpired => "subscription_expired",
            BillingError::UserBlocked => "user_blocked",
            BillingError::ConcurrentModification => "concurrent_modification",
            BillingError::Duplicate => "duplicate",
            BillingError::Payment(_) => "payment_error",
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
