//! Composition root. Built once in `main`, handed into the router as one
//! `Arc`-free `Clone` (every field is itself cheap to clone: pool handles,
//! `Arc<dyn _>` trait objects, and a plain config record).

use std::sync::Arc;

use creditcore_infra_compute::TaskBillingCoordinator;
use creditcore_infra_db::{
    AuditRepository, Db, InvoiceRepository, LedgerRepository, PromoRepository, TariffRepository,
    UserRepository,
};
use creditcore_infra_payment::PaymentVerifier;
use creditcore_domain_notification::Notifier;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub users: Arc<UserRepository>,
    pub tariffs: Arc<TariffRepository>,
    pub promo: Arc<PromoRepository>,
    pub invoices: Arc<InvoiceRepository>,
    pub ledger: Arc<LedgerRepository>,
    pub audit: Arc<AuditRepository>,
    pub verifier: Arc<dyn PaymentVerifier>,
    pub notifier: Arc<dyn Notifier>,
    pub compute: Arc<TaskBillingCoordinator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: Db,
        verifier: Arc<dyn PaymentVerifier>,
        notifier: Arc<dyn Notifier>,
        config: Config,
    ) -> Self {
        let pool = db.pool().clone();
        let client = reqwest::Client::new();
        let compute = TaskBillingCoordinator::new(
            client,
            config.compute_service_base_url.clone(),
            config.compute_service_api_key.clone(),
        );

        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            tariffs: Arc::new(TariffRepository::new(pool.clone())),
            promo: Arc::new(PromoRepository::new(pool.clone())),
            invoices: Arc::new(InvoiceRepository::new(pool.clone())),
            ledger: Arc::new(LedgerRepository::new(pool.clone())),
            audit: Arc::new(AuditRepository::new(pool)),
            db,
            verifier,
            notifier,
            compute: Arc::new(compute),
            config: Arc::new(config),
        }
    }
}
