use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    response::IntoResponse,
};

use lotledger_infra::{InventoryEngine, PositionAdjustment, PositionFilter};

use crate::app::{dto, errors};

/// Positions with disponible and commercialisable quantities side by side.
pub async fn query_positions(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Query(filter): Query<PositionFilter>,
) -> axum::response::Response {
    Json(engine.position_views(&filter)).into_response()
}

pub async fn query_available_lots(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Query(query): Query<dto::LotsQuery>,
) -> axum::response::Response {
    Json(engine.query_available_lots(query.article_id, query.depot_id)).into_response()
}

pub async fn adjust_position(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Json(body): Json<PositionAdjustment>,
) -> axum::response::Response {
    match engine.adjust_position(body) {
        Ok(position) => Json(position).into_response(),
        Err(rejection) => errors::rejection_to_response(rejection),
    }
}
