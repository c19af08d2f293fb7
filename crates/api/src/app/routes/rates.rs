use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use lotledger_infra::InventoryEngine;

use crate::app::dto;

pub async fn current_rates(Extension(engine): Extension<Arc<InventoryEngine>>) -> axum::response::Response {
    let rates = engine.rates_today();
    Json(dto::RatesResponse {
        source: engine.rate_source(),
        rates,
    })
    .into_response()
}

/// Force a provider call; the response says whether it answered.
pub async fn refresh_rates(
    Extension(engine): Extension<Arc<InventoryEngine>>,
    body: Option<Json<dto::RefreshRatesRequest>>,
) -> axum::response::Response {
    let date = body.and_then(|Json(b)| b.date);
    let rates = engine.refresh_rates(date);
    Json(dto::RatesResponse {
        source: engine.rate_source(),
        rates,
    })
    .into_response()
}
