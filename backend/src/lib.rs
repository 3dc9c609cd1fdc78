//! Consignment settlement platform backend
//!
//! Suitcases of stock travel with field sellers; periodic settlements
//! (acertos) turn whatever did not come back into recorded sales and
//! seller commission, then empty the suitcase for fresh stock.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use services::{
    AdminCheck, ReceiptRenderer, ReconciliationService, SettlementService, SuitcaseItemService,
    SuitcaseLocks,
};
use store::Store;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub locks: SuitcaseLocks,
    pub admin_check: Arc<dyn AdminCheck>,
    pub receipts: Arc<dyn ReceiptRenderer>,
}

impl AppState {
    pub fn settlement_service(&self) -> SettlementService {
        SettlementService::new(
            self.store.clone(),
            self.locks.clone(),
            self.admin_check.clone(),
            self.receipts.clone(),
            &self.config.settlement,
        )
    }

    pub fn suitcase_item_service(&self) -> SuitcaseItemService {
        SuitcaseItemService::new(self.store.clone())
    }

    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(
            self.store.clone(),
            self.locks.clone(),
            self.config.settlement.cleanup_attempts,
        )
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Consignment Settlement API v1.0"
}
