use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use lotledger_core::MovementId;
use lotledger_infra::InventoryEngine;
use lotledger_inventory::Movement;

use crate::app::{dto, errors};

pub async fn apply_movement(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Json(body): Json<dto::SubmitMovementRequest>,
) -> axum::response::Response {
    let movement = match Movement::new(
        body.movement_id.unwrap_or_else(MovementId::new),
        body.movement,
        body.occurred_at.unwrap_or_else(Utc::now),
    ) {
        Ok(m) => m,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match engine.apply_movement(movement) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(rejection) => errors::rejection_to_response(rejection),
    }
}

/// Audit trail: logged movements after sequence `after`.
pub async fn list_movements(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Query(query): Query<dto::MovementsQuery>,
) -> axum::response::Response {
    match engine.movements_since(query.after) {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "movement_log_error", e.to_string()),
    }
}
