//! Payment gateway adapters (C5's provider half): the `PaymentVerifier`
//! contract the orchestrator drives, the Robokassa MD5 signature scheme
//! both providers below share, and a mock provider that lets an invoice be
//! paid end-to-end without a live gateway contract.

pub mod mock;
pub mod robokassa;
pub mod signature;
pub mod verifier;

pub use mock::MockVerifier;
pub use robokassa::RobokassaVerifier;
pub use verifier::{PaymentVerifier, WebhookPayload};
