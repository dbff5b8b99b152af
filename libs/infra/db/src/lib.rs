//! Postgres persistence adapter: a pooled connection wrapper, the
//! repository per table, and the optimistic-concurrency ledger engine that
//! actually moves balances.

pub mod client;
pub mod errors;
pub mod repositories;

pub use client::Db;
pub use errors::DbError;
pub use repositories::{
    AuditRepository, InvoiceRepository, LedgerRepository, PromoRepository, TariffRepository,
    UserRepository,
};
