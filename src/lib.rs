pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod utils;

use std::sync::Arc;

use config::Config;
use db::{cache::CacheStore, LedgerExt};
use service::{
    gateway::BalanceProvider, ledger_service::LedgerService,
    reconciliation::ReconciliationService,
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub cache: Arc<dyn CacheStore>,
    // Services
    pub ledger_service: Arc<LedgerService>,
    pub reconciliation_service: Arc<ReconciliationService>,
}

impl AppState {
    pub fn new(
        config: Config,
        db_client: Arc<dyn LedgerExt>,
        cache: Arc<dyn CacheStore>,
        gateway: Arc<dyn BalanceProvider>,
    ) -> Self {
        let ledger_service = Arc::new(LedgerService::new(
            db_client.clone(),
            config.query_timeout(),
        ));

        let reconciliation_service = Arc::new(ReconciliationService::new(
            db_client,
            gateway,
            cache.clone(),
            config.reconciliation_cache_ttl(),
            config.gateway_balance_cache_ttl(),
        ));

        Self {
            env: config,
            cache,
            ledger_service,
            reconciliation_service,
        }
    }
}
