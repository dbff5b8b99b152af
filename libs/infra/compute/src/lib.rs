//! Task billing coordinator (C7): admission guard, the streaming proxy
//! against the external compute service, and the deferred debit on
//! successful completion. Everything that touches a connection or an
//! upstream socket lives here; the wire-record taxonomy in `record` stays
//! pure so it can be unit-tested without a live stream.

pub mod coordinator;
pub mod errors;
pub mod record;

pub use coordinator::{
    admit, AdmissionDecision, CostCapture, StreamOutcome, TaskBillingCoordinator, Terminal,
    DEFAULT_COST_MULTIPLIER, FALLBACK_RAW_COST,
};
pub use errors::ComputeError;
pub use record::{BotOutputRecord, BotOutputType, ErrorRecord, StreamRecord, TerminalRecord, TrackCostRecord};
