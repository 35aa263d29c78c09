pub mod auth;
pub mod common;
pub mod dashboard;
pub mod movements;
pub mod products;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{DashboardService, MovementLedgerService, ProductCatalogService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub product_catalog: Arc<ProductCatalogService>,
    pub movement_ledger: Arc<MovementLedgerService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        let offset = config.reporting_offset();
        let catalog = ProductCatalogService::new(db_pool.clone());
        let ledger = MovementLedgerService::new(
            db_pool,
            catalog.clone(),
            config.ledger_default_limit,
            offset,
        );
        let dashboard = DashboardService::new(catalog.clone(), ledger.clone(), offset);

        Self {
            product_catalog: Arc::new(catalog),
            movement_ledger: Arc::new(ledger),
            dashboard: Arc::new(dashboard),
        }
    }
}
