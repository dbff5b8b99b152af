//! One repository per table, plus the ledger engine that owns the
//! balance-mutating compare-and-swap loop. Each repository only knows its
//! own table; orchestration across repositories belongs to the services
//! above this crate.

pub mod audit;
pub mod invoices;
pub mod promo;
pub mod tariffs;
pub mod transactions;
pub mod users;

pub use audit::AuditRepository;
pub use invoices::InvoiceRepository;
pub use promo::PromoRepository;
pub use tariffs::TariffRepository;
pub use transactions::LedgerRepository;
pub use users::UserRepository;
