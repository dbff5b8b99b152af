//! Entity and value types shared across the billing core.
//!
//! Every type here is a plain value — a copy of what the store holds, never
//! an alias back into it. Persistence lives in `creditcore-infra-db`; domain
//! logic lives in `creditcore-domain-billing`. This crate only defines the
//! shapes both agree on.

pub mod audit;
pub mod enums;
pub mod invoice;
pub mod promo;
pub mod tariff;
pub mod transaction;
pub mod user;

pub use audit::AuditLog;
pub use enums::{DiscountType, InvoiceStatus, PeriodUnit, TransactionType};
pub use invoice::Invoice;
pub use promo::{PromoActivation, PromoCode};
pub use tariff::Tariff;
pub use transaction::Transaction;
pub use user::User;
