pub mod dashboard;
pub mod movement_ledger;
pub mod product_catalog;

pub use dashboard::DashboardService;
pub use movement_ledger::MovementLedgerService;
pub use product_catalog::ProductCatalogService;
