use creditcore_domain_billing::BillingError;
use thiserror::Error;

/// Errors from driving the compute-service stream. Billing failures that
/// happen *after* a task already completed successfully are deliberately
/// not represented here — the coordinator handles those at the call site,
/// and this type only covers the streaming proxy itself.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("compute service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed stream record: {0}")]
    Decode(String),

    #[error("compute service chunk exceeded the 1 MiB limit")]
    ChunkTooLarge,

    #[error("compute service closed the stream without a terminal record")]
    UpstreamClosed,

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl From<serde_json::Error> for ComputeError {
    fn from(err: serde_json::Error) -> Self {
        ComputeError::Decode(err.to_string())
    }
}
