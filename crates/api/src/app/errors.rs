use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use lotledger_core::DomainError;
use lotledger_inventory::{InventoryError, MovementRejection};

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> axum::response::Response {
    json_error_with_details(status, code, message, Value::Null)
}

pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn status_for(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::Validation { .. }
        | InventoryError::MissingLotSelection { .. }
        | InventoryError::QuantityConservation { .. } => StatusCode::BAD_REQUEST,
        InventoryError::InsufficientLotQuantity { .. }
        | InventoryError::InsufficientStock { .. }
        | InventoryError::LotMismatch { .. }
        | InventoryError::UnknownLot { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InventoryError::ConcurrentModification { .. } | InventoryError::LockTimeout { .. } => StatusCode::CONFLICT,
        InventoryError::CurrencyRateUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InventoryError::Domain(DomainError::NotFound(_)) => StatusCode::NOT_FOUND,
        InventoryError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
        InventoryError::Domain(DomainError::Validation(_) | DomainError::InvalidId(_)) => StatusCode::BAD_REQUEST,
        InventoryError::Domain(DomainError::InvariantViolation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Structured fields a client needs to correct the request.
pub fn details(err: &InventoryError) -> Value {
    match err {
        InventoryError::Validation { field, .. } => json!({ "field": field }),
        InventoryError::InsufficientLotQuantity {
            lot_id,
            requested_kg,
            remaining_kg,
        } => json!({
            "lot_id": lot_id,
            "requested_kg": requested_kg,
            "remaining_kg": remaining_kg,
            "shortfall_kg": err.shortfall_kg(),
        }),
        InventoryError::InsufficientStock {
            article_id,
            depot_id,
            requested_kg,
            available_kg,
        } => json!({
            "article_id": article_id,
            "depot_id": depot_id,
            "requested_kg": requested_kg,
            "available_kg": available_kg,
            "shortfall_kg": err.shortfall_kg(),
        }),
        InventoryError::LotMismatch {
            lot_id,
            expected_article,
            expected_depot,
            actual_article,
            actual_depot,
        } => json!({
            "lot_id": lot_id,
            "expected_article": expected_article,
            "expected_depot": expected_depot,
            "actual_article": actual_article,
            "actual_depot": actual_depot,
        }),
        InventoryError::UnknownLot { lot_id } => json!({ "lot_id": lot_id }),
        InventoryError::QuantityConservation {
            article_id,
            requested_kg,
            allocated_kg,
        } => json!({
            "article_id": article_id,
            "requested_kg": requested_kg,
            "allocated_kg": allocated_kg,
        }),
        InventoryError::MissingLotSelection {
            article_id,
            depot_id,
            quantity_kg,
        } => json!({
            "article_id": article_id,
            "depot_id": depot_id,
            "quantity_kg": quantity_kg,
        }),
        InventoryError::CurrencyRateUnavailable { reason } => json!({ "reason": reason }),
        InventoryError::ConcurrentModification {
            depot_id,
            article_id,
            expected_version,
            actual_version,
        } => json!({
            "depot_id": depot_id,
            "article_id": article_id,
            "expected_version": expected_version,
            "actual_version": actual_version,
            "retryable": true,
        }),
        InventoryError::LockTimeout {
            depot_id,
            article_id,
            waited_ms,
        } => json!({
            "depot_id": depot_id,
            "article_id": article_id,
            "waited_ms": waited_ms,
            "retryable": true,
        }),
        InventoryError::Domain(_) => Value::Null,
    }
}

pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    json_error_with_details(status_for(&err), err.code(), err.to_string(), details(&err))
}

/// A rejection reports every error; status and code follow the first one.
pub fn rejection_to_response(rejection: MovementRejection) -> axum::response::Response {
    let Some(first) = rejection.first() else {
        return json_error(StatusCode::UNPROCESSABLE_ENTITY, "rejected", rejection.to_string());
    };

    let errors: Vec<Value> = rejection
        .errors
        .iter()
        .map(|e| {
            json!({
                "error": e.code(),
                "message": e.to_string(),
                "details": details(e),
            })
        })
        .collect();

    json_error_with_details(
        status_for(first),
        first.code(),
        rejection.to_string(),
        json!({
            "movement_id": rejection.movement_id,
            "status": rejection.status,
            "errors": errors,
        }),
    )
}
