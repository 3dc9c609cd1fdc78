//! Route definitions for the consignment settlement platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - settlements
        .nest("/settlements", settlement_routes(state.clone()))
        // Protected routes - suitcases and their items
        .nest("/suitcases", suitcase_routes(state.clone()))
        .nest("/suitcase-items", suitcase_item_routes(state))
}

/// Settlement routes (protected)
fn settlement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_settlements).post(handlers::create_settlement),
        )
        .route(
            "/:settlement_id",
            get(handlers::get_settlement).delete(handlers::delete_settlement),
        )
        .route(
            "/:settlement_id/status",
            put(handlers::update_settlement_status),
        )
        .route("/:settlement_id/receipt", post(handlers::generate_receipt))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Suitcase routes (protected)
fn suitcase_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:suitcase_id/items",
            get(handlers::list_items).post(handlers::add_item),
        )
        .route("/:suitcase_id/reconcile", post(handlers::reconcile_suitcase))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Suitcase item routes (protected)
fn suitcase_item_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:item_id/quantity", put(handlers::update_quantity))
        .route("/:item_id/return", post(handlers::return_item))
        .route("/:item_id/lost", post(handlers::mark_lost))
        .route("/:item_id/sale", post(handlers::annotate_sale))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
