//! Lot selection strategies.
//!
//! Callers pick the strategy; the planner never infers it from whether lot
//! ids happen to be present.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use lotledger_core::LotId;

use crate::error::InventoryError;
use crate::lot::Lot;
use crate::movement::{LotAllocation, LotSelection};
use crate::position::PositionKey;
use crate::quantity::{checked_total, within_tolerance};

/// Read access to lots as the allocating movement currently sees them.
pub trait LotSource {
    fn lot(&self, id: LotId) -> Option<Lot>;

    /// Lots of `key` with stock left, oldest first (ties in insertion order).
    fn available(&self, key: PositionKey) -> Vec<Lot>;
}

pub type AllocationResult = Result<Vec<LotSelection>, Vec<InventoryError>>;

pub trait AllocationStrategy {
    /// Choose lots of `key` covering `requested_kg`.
    fn select(&self, key: PositionKey, requested_kg: Decimal, lots: &dyn LotSource) -> AllocationResult;
}

/// Consume the oldest lots first until the request is met.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl AllocationStrategy for Fifo {
    fn select(&self, key: PositionKey, requested_kg: Decimal, lots: &dyn LotSource) -> AllocationResult {
        if requested_kg <= Decimal::ZERO {
            return Err(vec![InventoryError::validation(
                "quantity_kg",
                format!("requested quantity must be > 0, got {requested_kg}"),
            )]);
        }

        let available = lots.available(key);
        let total = checked_total(available.iter().map(Lot::remaining_quantity_kg)).map_err(|e| vec![e])?;
        if total < requested_kg {
            return Err(vec![InventoryError::InsufficientStock {
                article_id: key.article_id,
                depot_id: key.depot_id,
                requested_kg,
                available_kg: total,
            }]);
        }

        let mut left = requested_kg;
        let mut selections = Vec::new();
        for lot in available {
            if left <= Decimal::ZERO {
                break;
            }
            let take = left.min(lot.remaining_quantity_kg());
            selections.push(LotSelection::new(lot.id_typed(), take));
            left -= take;
        }
        Ok(selections)
    }
}

/// Lots chosen by the caller.
///
/// Every lot must exist, belong to the position and hold enough stock, and
/// the selection must add up to the request within tolerance. Repeated lot
/// ids are merged.
#[derive(Debug, Clone, Copy)]
pub struct ExplicitLots<'a> {
    selections: &'a [LotSelection],
}

impl<'a> ExplicitLots<'a> {
    pub fn new(selections: &'a [LotSelection]) -> Self {
        Self { selections }
    }
}

impl AllocationStrategy for ExplicitLots<'_> {
    fn select(&self, key: PositionKey, requested_kg: Decimal, lots: &dyn LotSource) -> AllocationResult {
        let mut errors = Vec::new();

        // Merge while keeping first-seen order.
        let mut order = Vec::new();
        let mut merged: BTreeMap<LotId, Decimal> = BTreeMap::new();
        for selection in self.selections {
            if selection.quantity_kg <= Decimal::ZERO {
                errors.push(InventoryError::validation(
                    "lots",
                    format!("quantity for lot {} must be > 0", selection.lot_id),
                ));
                continue;
            }
            let entry = merged.entry(selection.lot_id).or_insert_with(|| {
                order.push(selection.lot_id);
                Decimal::ZERO
            });
            match entry.checked_add(selection.quantity_kg) {
                Some(total) => *entry = total,
                None => errors.push(InventoryError::overflow("lots")),
            }
        }

        let allocated = match checked_total(merged.values().copied()) {
            Ok(total) => total,
            Err(e) => {
                errors.push(e);
                return Err(errors);
            }
        };
        if !within_tolerance(allocated, requested_kg) {
            errors.push(InventoryError::QuantityConservation {
                article_id: key.article_id,
                requested_kg,
                allocated_kg: allocated,
            });
        }

        let mut selections = Vec::with_capacity(order.len());
        for lot_id in order {
            let quantity_kg = merged.get(&lot_id).copied().unwrap_or_default();
            let Some(lot) = lots.lot(lot_id) else {
                errors.push(InventoryError::UnknownLot { lot_id });
                continue;
            };
            if lot.key() != key {
                errors.push(InventoryError::LotMismatch {
                    lot_id,
                    expected_article: key.article_id,
                    expected_depot: key.depot_id,
                    actual_article: lot.article_id(),
                    actual_depot: lot.depot_id(),
                });
                continue;
            }
            if quantity_kg > lot.remaining_quantity_kg() {
                errors.push(InventoryError::InsufficientLotQuantity {
                    lot_id,
                    requested_kg: quantity_kg,
                    remaining_kg: lot.remaining_quantity_kg(),
                });
                continue;
            }
            selections.push(LotSelection::new(lot_id, quantity_kg));
        }

        if errors.is_empty() { Ok(selections) } else { Err(errors) }
    }
}

impl LotAllocation {
    pub fn strategy(&self) -> Box<dyn AllocationStrategy + '_> {
        match self {
            LotAllocation::Fifo => Box::new(Fifo),
            LotAllocation::Explicit { lots } => Box::new(ExplicitLots::new(lots)),
        }
    }
}
