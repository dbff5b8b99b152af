use creditcore_domain_billing::BillingError;
use thiserror::Error;

/// Persistence-layer error catalog. Repositories translate [`sqlx::Error`]
/// into these, and into [`BillingError`] at the point they know enough
/// domain context to (`NotFound`, `Duplicate`, `ConcurrentModification`).
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("optimistic concurrency conflict, retry the operation")]
    ConcurrentModification,

    #[error("row not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate idempotency key")]
    Duplicate,
}

impl From<DbError> for BillingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => BillingError::NotFound { entity, id },
            DbError::ConcurrentModification => BillingError::ConcurrentModification,
            DbError::Duplicate => BillingError::Duplicate,
            other => BillingError::Validation(other.to_string()),
        }
    }
}
