use axum::{
    Router,
    routing::{get, post},
};

pub mod movements;
pub mod positions;
pub mod rates;
pub mod reporting;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/movements", post(movements::apply_movement).get(movements::list_movements))
        .route("/positions", get(positions::query_positions))
        .route("/positions/adjust", post(positions::adjust_position))
        .route("/positions/value", get(reporting::value_position))
        .route("/lots", get(positions::query_available_lots))
        .route("/articles/:id/rollup", get(reporting::article_rollup))
        .route("/depots/:id/summary", get(reporting::depot_summary))
        .route("/rollup", get(reporting::global_rollup))
        .route("/rates", get(rates::current_rates))
        .route("/rates/refresh", post(rates::refresh_rates))
        .route("/landed-cost", post(reporting::landed_cost))
}
