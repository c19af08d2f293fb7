use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use lotledger_infra::InventoryEngine;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the router over a shared engine.
pub fn build_app(engine: Arc<InventoryEngine>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(engine)))
}
