use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use lotledger_core::{ArticleId, DepotId};
use lotledger_infra::InventoryEngine;

use crate::app::{dto, errors};

pub async fn article_rollup(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Path(id): Path<String>,
    Query(query): Query<dto::CurrencyQuery>,
) -> axum::response::Response {
    let article_id: ArticleId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid article id"),
    };

    match engine.article_rollup(article_id, query.currency) {
        Ok(rollup) => Json(rollup).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn global_rollup(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Query(query): Query<dto::CurrencyQuery>,
) -> axum::response::Response {
    match engine.global_rollup(query.currency) {
        Ok(rollup) => Json(rollup).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn depot_summary(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Path(id): Path<String>,
    Query(query): Query<dto::CurrencyQuery>,
) -> axum::response::Response {
    let depot_id: DepotId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid depot id"),
    };

    match engine.depot_summary(depot_id, query.currency) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn value_position(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Query(query): Query<dto::ValuePositionQuery>,
) -> axum::response::Response {
    match engine.value_position(query.depot_id, query.article_id, query.currency) {
        Ok(valuation) => Json(valuation).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Decision support only; the ledger is not touched.
pub async fn landed_cost(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    Json(body): Json<dto::LandedCostRequest>,
) -> axum::response::Response {
    match engine.landed_cost(body.depot_id, body.article_id, &body.inputs) {
        Ok(cost) => Json(cost).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
