use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_core::{ArticleId, CurrencyCode, DepotId, Entity, LotId};
use lotledger_valuation::ValuedQuantity;

use crate::error::{InventoryError, InventoryResult};
use crate::position::PositionKey;

/// Everything needed to open a lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLot {
    pub article_id: ArticleId,
    pub depot_id: DepotId,
    pub batch_number: Option<String>,
    pub quantity_kg: Decimal,
    pub unit_cost: Decimal,
    pub cost_currency: CurrencyCode,
    /// Set when the lot was split off another lot by a transfer.
    pub source_lot: Option<LotId>,
    pub created_at: DateTime<Utc>,
}

/// A traceable batch of one article in one depot.
///
/// Lots are append-only: once created only `remaining_quantity_kg` changes,
/// and only downwards, so `0 <= remaining <= original` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    id: LotId,
    article_id: ArticleId,
    depot_id: DepotId,
    batch_number: Option<String>,
    original_quantity_kg: Decimal,
    remaining_quantity_kg: Decimal,
    unit_cost: Decimal,
    cost_currency: CurrencyCode,
    source_lot: Option<LotId>,
    created_at: DateTime<Utc>,
}

impl Lot {
    pub fn create(id: LotId, new: NewLot) -> InventoryResult<Self> {
        if new.quantity_kg <= Decimal::ZERO {
            return Err(InventoryError::validation(
                "quantity_kg",
                format!("lot quantity must be > 0, got {}", new.quantity_kg),
            ));
        }
        if new.unit_cost < Decimal::ZERO {
            return Err(InventoryError::validation(
                "unit_cost",
                format!("unit cost must be >= 0, got {}", new.unit_cost),
            ));
        }

        Ok(Self {
            id,
            article_id: new.article_id,
            depot_id: new.depot_id,
            batch_number: new.batch_number,
            original_quantity_kg: new.quantity_kg,
            remaining_quantity_kg: new.quantity_kg,
            unit_cost: new.unit_cost,
            cost_currency: new.cost_currency,
            source_lot: new.source_lot,
            created_at: new.created_at,
        })
    }

    /// Take `quantity_kg` out of the lot.
    pub fn allocate(&mut self, quantity_kg: Decimal) -> InventoryResult<()> {
        if quantity_kg <= Decimal::ZERO {
            return Err(InventoryError::validation(
                "quantity_kg",
                format!("allocation must be > 0, got {quantity_kg}"),
            ));
        }
        if quantity_kg > self.remaining_quantity_kg {
            return Err(InventoryError::InsufficientLotQuantity {
                lot_id: self.id,
                requested_kg: quantity_kg,
                remaining_kg: self.remaining_quantity_kg,
            });
        }
        self.remaining_quantity_kg -= quantity_kg;
        Ok(())
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn article_id(&self) -> ArticleId {
        self.article_id
    }

    pub fn depot_id(&self) -> DepotId {
        self.depot_id
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.depot_id, self.article_id)
    }

    pub fn batch_number(&self) -> Option<&str> {
        self.batch_number.as_deref()
    }

    pub fn original_quantity_kg(&self) -> Decimal {
        self.original_quantity_kg
    }

    pub fn remaining_quantity_kg(&self) -> Decimal {
        self.remaining_quantity_kg
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn cost_currency(&self) -> &CurrencyCode {
        &self.cost_currency
    }

    pub fn source_lot(&self) -> Option<LotId> {
        self.source_lot
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_available(&self) -> bool {
        self.remaining_quantity_kg > Decimal::ZERO
    }

    /// Value of the remaining quantity in the lot's own currency.
    pub fn remaining_value(&self) -> InventoryResult<Decimal> {
        self.remaining_quantity_kg
            .checked_mul(self.unit_cost)
            .ok_or_else(|| InventoryError::overflow("remaining_quantity_kg"))
    }

    pub fn valued_remainder(&self) -> ValuedQuantity {
        ValuedQuantity {
            quantity_kg: self.remaining_quantity_kg,
            unit_cost: self.unit_cost,
            currency: self.cost_currency.clone(),
        }
    }
}

impl Entity for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn new_lot(article_id: ArticleId, depot_id: DepotId, kg: Decimal, cost: Decimal) -> NewLot {
        NewLot {
            article_id,
            depot_id,
            batch_number: None,
            quantity_kg: kg,
            unit_cost: cost,
            cost_currency: CurrencyCode::new("MRU").unwrap(),
            source_lot: None,
            created_at: Utc::now(),
        }
    }

    fn lot(kg: Decimal) -> Lot {
        Lot::create(LotId::new(), new_lot(ArticleId::new(), DepotId::new(), kg, dec!(10))).unwrap()
    }

    #[test]
    fn opens_with_full_remaining() {
        let lot = lot(dec!(1000));
        assert_eq!(lot.remaining_quantity_kg(), dec!(1000));
        assert_eq!(lot.remaining_value().unwrap(), dec!(10000));
        assert!(lot.is_available());
    }

    #[test]
    fn rejects_empty_or_negative_cost_lots() {
        let (a, d) = (ArticleId::new(), DepotId::new());
        assert!(Lot::create(LotId::new(), new_lot(a, d, dec!(0), dec!(1))).is_err());
        assert!(Lot::create(LotId::new(), new_lot(a, d, dec!(5), dec!(-1))).is_err());
        assert!(Lot::create(LotId::new(), new_lot(a, d, dec!(5), dec!(0))).is_ok());
    }

    #[test]
    fn allocation_decrements_exactly() {
        let mut lot = lot(dec!(1000));
        lot.allocate(dec!(300)).unwrap();
        assert_eq!(lot.remaining_quantity_kg(), dec!(700));

        lot.allocate(dec!(700)).unwrap();
        assert!(!lot.is_available());
    }

    #[test]
    fn over_allocation_reports_shortfall() {
        let mut lot = lot(dec!(100));
        let err = lot.allocate(dec!(120)).unwrap_err();

        assert_eq!(err.shortfall_kg(), Some(dec!(20)));
        assert_eq!(lot.remaining_quantity_kg(), dec!(100));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn remaining_stays_within_bounds(
                original in 1i64..1_000_000,
                draws in prop::collection::vec(1i64..500_000, 0..30),
            ) {
                let mut lot = lot(Decimal::new(original, 2));
                for draw in draws {
                    // Over-draws are refused; either way the bounds hold.
                    let _ = lot.allocate(Decimal::new(draw, 2));
                    prop_assert!(lot.remaining_quantity_kg() >= Decimal::ZERO);
                    prop_assert!(lot.remaining_quantity_kg() <= lot.original_quantity_kg());
                }
            }
        }
    }
}
