//! Ledger error taxonomy.
//!
//! Every variant carries enough structure (lot, article, depot, quantities)
//! for a caller to present a corrective action without parsing messages.

use rust_decimal::Decimal;
use thiserror::Error;

use lotledger_core::{ArticleId, DepotId, DomainError, LotId, MovementId};
use lotledger_valuation::ValuationError;

use crate::movement::MovementStatus;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Missing or malformed input.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("lot {lot_id} has {remaining_kg} kg remaining, {requested_kg} kg requested")]
    InsufficientLotQuantity {
        lot_id: LotId,
        requested_kg: Decimal,
        remaining_kg: Decimal,
    },

    #[error("insufficient stock of article {article_id} in depot {depot_id}: {requested_kg} kg requested, {available_kg} kg available")]
    InsufficientStock {
        article_id: ArticleId,
        depot_id: DepotId,
        requested_kg: Decimal,
        available_kg: Decimal,
    },

    #[error("lot {lot_id} belongs to article {actual_article} in depot {actual_depot}, not article {expected_article} in depot {expected_depot}")]
    LotMismatch {
        lot_id: LotId,
        expected_article: ArticleId,
        expected_depot: DepotId,
        actual_article: ArticleId,
        actual_depot: DepotId,
    },

    #[error("unknown lot {lot_id}")]
    UnknownLot { lot_id: LotId },

    #[error("lot selection for article {article_id} sums to {allocated_kg} kg, {requested_kg} kg requested")]
    QuantityConservation {
        article_id: ArticleId,
        requested_kg: Decimal,
        allocated_kg: Decimal,
    },

    #[error("decrease of {quantity_kg} kg of article {article_id} in depot {depot_id} requires an explicit lot selection")]
    MissingLotSelection {
        article_id: ArticleId,
        depot_id: DepotId,
        quantity_kg: Decimal,
    },

    /// Non-fatal: the caller falls back to cached or static rates.
    #[error("currency rates unavailable: {reason}")]
    CurrencyRateUnavailable { reason: String },

    #[error("position ({depot_id}, {article_id}) changed concurrently: expected version {expected_version}, found {actual_version}")]
    ConcurrentModification {
        depot_id: DepotId,
        article_id: ArticleId,
        expected_version: u64,
        actual_version: u64,
    },

    #[error("timed out after {waited_ms} ms waiting for position ({depot_id}, {article_id})")]
    LockTimeout {
        depot_id: DepotId,
        article_id: ArticleId,
        waited_ms: u64,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InventoryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Arithmetic on `field` left the representable range.
    pub fn overflow(field: impl Into<String>) -> Self {
        Self::validation(field, "value overflowed")
    }

    /// Only concurrency failures are worth retrying; business rules fail the same way twice.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::LockTimeout { .. }
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InsufficientLotQuantity { .. } => "insufficient_lot_quantity",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::LotMismatch { .. } => "lot_mismatch",
            Self::UnknownLot { .. } => "unknown_lot",
            Self::QuantityConservation { .. } => "quantity_conservation",
            Self::MissingLotSelection { .. } => "missing_lot_selection",
            Self::CurrencyRateUnavailable { .. } => "currency_rate_unavailable",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::Domain(DomainError::NotFound(_)) => "not_found",
            Self::Domain(DomainError::Conflict(_)) => "conflict",
            Self::Domain(_) => "domain_error",
        }
    }

    /// Quantity missing to satisfy the request, where the error is about a shortfall.
    pub fn shortfall_kg(&self) -> Option<Decimal> {
        match self {
            Self::InsufficientLotQuantity {
                requested_kg,
                remaining_kg,
                ..
            } => Some(requested_kg - remaining_kg),
            Self::InsufficientStock {
                requested_kg,
                available_kg,
                ..
            } => Some(requested_kg - available_kg),
            _ => None,
        }
    }
}

impl From<ValuationError> for InventoryError {
    fn from(value: ValuationError) -> Self {
        match value {
            ValuationError::RateUnavailable { reason, .. } => {
                Self::CurrencyRateUnavailable { reason }
            }
            ValuationError::MissingRate { currency, date } => Self::CurrencyRateUnavailable {
                reason: format!("no rate for {currency} on {date}"),
            },
            ValuationError::Validation(message) => Self::validation("valuation", message),
        }
    }
}

/// Every reason a movement was not applied, in the order they were found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("movement rejected with {} error(s)", errors.len())]
pub struct MovementRejection {
    pub movement_id: Option<MovementId>,
    /// Lifecycle status the movement was left in.
    pub status: MovementStatus,
    pub errors: Vec<InventoryError>,
}

impl MovementRejection {
    pub fn new(movement_id: Option<MovementId>, errors: Vec<InventoryError>) -> Self {
        Self {
            movement_id,
            status: MovementStatus::Rejected,
            errors,
        }
    }

    pub fn single(movement_id: Option<MovementId>, error: InventoryError) -> Self {
        Self::new(movement_id, vec![error])
    }

    /// A rejection is retryable only when every error in it is.
    pub fn is_retryable(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(InventoryError::is_retryable)
    }

    pub fn first(&self) -> Option<&InventoryError> {
        self.errors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn only_concurrency_failures_are_retryable() {
        let conflict = InventoryError::ConcurrentModification {
            depot_id: DepotId::new(),
            article_id: ArticleId::new(),
            expected_version: 1,
            actual_version: 2,
        };
        let shortage = InventoryError::InsufficientStock {
            article_id: ArticleId::new(),
            depot_id: DepotId::new(),
            requested_kg: dec!(10),
            available_kg: dec!(4),
        };

        assert!(conflict.is_retryable());
        assert!(!shortage.is_retryable());
        assert_eq!(shortage.shortfall_kg(), Some(dec!(6)));
        assert!(!MovementRejection::new(None, vec![conflict, shortage]).is_retryable());
    }

    #[test]
    fn rate_failures_map_to_unavailable() {
        let err = InventoryError::from(ValuationError::RateUnavailable {
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            reason: "provider down".to_string(),
        });
        assert_eq!(err.code(), "currency_rate_unavailable");
        assert!(!err.is_retryable());
    }

    #[test]
    fn domain_errors_keep_their_message() {
        let err = InventoryError::from(DomainError::not_found("article 42"));
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), "not found: article 42");
    }
}
