use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_core::{AggregateRoot, ArticleId, CurrencyCode, DepotId};
use lotledger_valuation::average_over;

use crate::error::{InventoryError, InventoryResult};

/// Identity of a stock position.
///
/// Ordering is depot first, then article; multi-key operations lock keys in
/// this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub depot_id: DepotId,
    pub article_id: ArticleId,
}

impl PositionKey {
    pub fn new(depot_id: DepotId, article_id: ArticleId) -> Self {
        Self { depot_id, article_id }
    }
}

impl core::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.depot_id, self.article_id)
    }
}

/// How a release was split between sellable and quarantined stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ReleaseSplit {
    pub commercialisable_kg: Decimal,
    pub quarantined_kg: Decimal,
}

/// Aggregate stock record for one (depot, article) pair.
///
/// Maintained incrementally from lot operations. `inventory_value` is the sum
/// of `remaining * unit_cost` over the position's lots and the average cost is
/// `inventory_value / quantity_kg`, which keeps its last value once the
/// position is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    key: PositionKey,
    quantity_kg: Decimal,
    quantity_commercialisable_kg: Decimal,
    inventory_value: Decimal,
    average_unit_cost: Decimal,
    cost_currency: Option<CurrencyCode>,
    version: u64,
}

impl StockPosition {
    /// A position that has never seen a movement.
    pub fn empty(key: PositionKey) -> Self {
        Self {
            key,
            quantity_kg: Decimal::ZERO,
            quantity_commercialisable_kg: Decimal::ZERO,
            inventory_value: Decimal::ZERO,
            average_unit_cost: Decimal::ZERO,
            cost_currency: None,
            version: 0,
        }
    }

    pub fn key(&self) -> PositionKey {
        self.key
    }

    pub fn depot_id(&self) -> DepotId {
        self.key.depot_id
    }

    pub fn article_id(&self) -> ArticleId {
        self.key.article_id
    }

    pub fn quantity_kg(&self) -> Decimal {
        self.quantity_kg
    }

    pub fn quantity_commercialisable_kg(&self) -> Decimal {
        self.quantity_commercialisable_kg
    }

    pub fn quantity_quarantined_kg(&self) -> Decimal {
        self.quantity_kg - self.quantity_commercialisable_kg
    }

    pub fn inventory_value(&self) -> Decimal {
        self.inventory_value
    }

    pub fn average_unit_cost(&self) -> Decimal {
        self.average_unit_cost
    }

    pub fn cost_currency(&self) -> Option<&CurrencyCode> {
        self.cost_currency.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.quantity_kg <= Decimal::ZERO
    }

    /// Add stock received at `unit_cost`.
    ///
    /// `commercialisable_kg` of the receipt is sellable, the rest goes to
    /// quarantine. The first receipt into an empty position sets its currency.
    pub fn receive(
        &mut self,
        quantity_kg: Decimal,
        unit_cost: Decimal,
        currency: &CurrencyCode,
        commercialisable_kg: Decimal,
    ) -> InventoryResult<()> {
        if quantity_kg <= Decimal::ZERO {
            return Err(InventoryError::validation(
                "quantity_kg",
                format!("receipt must be > 0, got {quantity_kg}"),
            ));
        }
        if unit_cost < Decimal::ZERO {
            return Err(InventoryError::validation(
                "unit_cost",
                format!("unit cost must be >= 0, got {unit_cost}"),
            ));
        }
        if commercialisable_kg < Decimal::ZERO || commercialisable_kg > quantity_kg {
            return Err(InventoryError::validation(
                "commercialisable_kg",
                format!("sellable share {commercialisable_kg} outside 0..={quantity_kg}"),
            ));
        }

        let overflow = || InventoryError::overflow("quantity_kg");
        let next_quantity = self.quantity_kg.checked_add(quantity_kg).ok_or_else(overflow)?;
        let next_value = quantity_kg
            .checked_mul(unit_cost)
            .and_then(|value| self.inventory_value.checked_add(value))
            .ok_or_else(overflow)?;

        match &self.cost_currency {
            Some(existing) if existing != currency && !self.is_empty() => {
                return Err(InventoryError::validation(
                    "currency",
                    format!(
                        "position {} is valued in {existing}, cannot receive stock costed in {currency}",
                        self.key
                    ),
                ));
            }
            _ => self.cost_currency = Some(currency.clone()),
        }

        self.quantity_kg = next_quantity;
        self.quantity_commercialisable_kg += commercialisable_kg;
        self.inventory_value = next_value;
        self.recompute_average();
        Ok(())
    }

    /// Remove `quantity_kg` whose lots were worth `value` in total.
    ///
    /// Sellable stock is drawn first, quarantined stock after.
    pub fn release(&mut self, quantity_kg: Decimal, value: Decimal) -> InventoryResult<ReleaseSplit> {
        if quantity_kg <= Decimal::ZERO {
            return Err(InventoryError::validation(
                "quantity_kg",
                format!("release must be > 0, got {quantity_kg}"),
            ));
        }
        if quantity_kg > self.quantity_kg {
            return Err(InventoryError::InsufficientStock {
                article_id: self.key.article_id,
                depot_id: self.key.depot_id,
                requested_kg: quantity_kg,
                available_kg: self.quantity_kg,
            });
        }

        let commercialisable_kg = quantity_kg.min(self.quantity_commercialisable_kg);
        let split = ReleaseSplit {
            commercialisable_kg,
            quarantined_kg: quantity_kg - commercialisable_kg,
        };

        self.quantity_kg -= quantity_kg;
        self.quantity_commercialisable_kg -= commercialisable_kg;
        if self.is_empty() {
            self.inventory_value = Decimal::ZERO;
        } else {
            self.inventory_value = self
                .inventory_value
                .checked_sub(value)
                .ok_or_else(|| InventoryError::overflow("quantity_kg"))?;
        }
        self.recompute_average();
        Ok(split)
    }

    /// Move stock into (`delta < 0`) or out of (`delta > 0`) quarantine.
    pub fn shift_commercialisable(&mut self, delta_kg: Decimal) -> InventoryResult<()> {
        if delta_kg.is_zero() {
            return Err(InventoryError::validation("delta_kg", "delta cannot be zero"));
        }
        let next = self.quantity_commercialisable_kg + delta_kg;
        if next < Decimal::ZERO {
            return Err(InventoryError::InsufficientStock {
                article_id: self.key.article_id,
                depot_id: self.key.depot_id,
                requested_kg: -delta_kg,
                available_kg: self.quantity_commercialisable_kg,
            });
        }
        if next > self.quantity_kg {
            return Err(InventoryError::InsufficientStock {
                article_id: self.key.article_id,
                depot_id: self.key.depot_id,
                requested_kg: delta_kg,
                available_kg: self.quantity_quarantined_kg(),
            });
        }
        self.quantity_commercialisable_kg = next;
        Ok(())
    }

    /// Stamp the version this state will be committed at.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }

    fn recompute_average(&mut self) {
        if let Some(avg) = average_over(self.inventory_value, self.quantity_kg) {
            self.average_unit_cost = avg;
        }
    }
}

impl AggregateRoot for StockPosition {
    type Id = PositionKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mru() -> CurrencyCode {
        CurrencyCode::new("MRU").unwrap()
    }

    fn position() -> StockPosition {
        StockPosition::empty(PositionKey::new(DepotId::new(), ArticleId::new()))
    }

    #[test]
    fn receipts_follow_weighted_average() {
        let mut pos = position();
        pos.receive(dec!(1000), dec!(10), &mru(), dec!(1000)).unwrap();
        assert_eq!(pos.average_unit_cost(), dec!(10));

        pos.receive(dec!(500), dec!(16), &mru(), dec!(500)).unwrap();
        assert_eq!(pos.quantity_kg(), dec!(1500));
        assert_eq!(pos.average_unit_cost(), dec!(12));
    }

    #[test]
    fn oversized_receipt_fails_and_leaves_position_alone() {
        let mut pos = position();
        pos.receive(dec!(100), dec!(10), &mru(), dec!(100)).unwrap();
        let before = pos.clone();

        let huge_kg = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let huge_cost = Decimal::from(10_000_000_000u64);
        let err = pos.receive(huge_kg, huge_cost, &mru(), Decimal::ZERO).unwrap_err();

        assert_eq!(err.code(), "validation_error");
        assert_eq!(pos, before);
    }

    #[test]
    fn release_recomputes_over_what_is_left() {
        let mut pos = position();
        pos.receive(dec!(1000), dec!(10), &mru(), dec!(1000)).unwrap();
        pos.receive(dec!(500), dec!(16), &mru(), dec!(500)).unwrap();

        // 300 kg drawn from the 10 MRU lot.
        pos.release(dec!(300), dec!(3000)).unwrap();
        assert_eq!(pos.quantity_kg(), dec!(1200));
        assert_eq!(pos.inventory_value(), dec!(15000));
        assert_eq!(pos.average_unit_cost(), dec!(12.5));
    }

    #[test]
    fn emptied_position_keeps_last_average() {
        let mut pos = position();
        pos.receive(dec!(10), dec!(7), &mru(), dec!(10)).unwrap();
        pos.release(dec!(10), dec!(70)).unwrap();

        assert!(pos.is_empty());
        assert_eq!(pos.inventory_value(), Decimal::ZERO);
        assert_eq!(pos.average_unit_cost(), dec!(7));
    }

    #[test]
    fn quarantined_stock_is_released_last() {
        let mut pos = position();
        pos.receive(dec!(100), dec!(5), &mru(), dec!(60)).unwrap();
        assert_eq!(pos.quantity_quarantined_kg(), dec!(40));

        let split = pos.release(dec!(80), dec!(400)).unwrap();
        assert_eq!(split.commercialisable_kg, dec!(60));
        assert_eq!(split.quarantined_kg, dec!(20));
        assert_eq!(pos.quantity_commercialisable_kg(), Decimal::ZERO);
        assert_eq!(pos.quantity_kg(), dec!(20));
    }

    #[test]
    fn release_beyond_quantity_is_insufficient_stock() {
        let mut pos = position();
        pos.receive(dec!(50), dec!(5), &mru(), dec!(50)).unwrap();
        let err = pos.release(dec!(60), dec!(300)).unwrap_err();
        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(pos.quantity_kg(), dec!(50));
    }

    #[test]
    fn commercialisable_stays_within_total() {
        let mut pos = position();
        pos.receive(dec!(100), dec!(5), &mru(), dec!(100)).unwrap();

        pos.shift_commercialisable(dec!(-30)).unwrap();
        assert_eq!(pos.quantity_commercialisable_kg(), dec!(70));
        assert_eq!(pos.quantity_kg(), dec!(100));

        assert!(pos.shift_commercialisable(dec!(31)).is_err());
        assert!(pos.shift_commercialisable(dec!(-71)).is_err());
        pos.shift_commercialisable(dec!(30)).unwrap();
        assert_eq!(pos.quantity_quarantined_kg(), Decimal::ZERO);
    }

    #[test]
    fn currency_is_fixed_while_holding_stock() {
        let eur = CurrencyCode::new("EUR").unwrap();
        let mut pos = position();
        pos.receive(dec!(10), dec!(1), &mru(), dec!(10)).unwrap();

        assert!(pos.receive(dec!(10), dec!(1), &eur, dec!(10)).is_err());

        pos.release(dec!(10), dec!(10)).unwrap();
        pos.receive(dec!(10), dec!(1), &eur, dec!(10)).unwrap();
        assert_eq!(pos.cost_currency(), Some(&eur));
    }

    #[test]
    fn keys_order_by_depot_then_article() {
        let d1 = DepotId::from_uuid(uuid::Uuid::from_u128(1));
        let d2 = DepotId::from_uuid(uuid::Uuid::from_u128(2));
        let a1 = ArticleId::from_uuid(uuid::Uuid::from_u128(1));
        let a2 = ArticleId::from_uuid(uuid::Uuid::from_u128(2));

        let mut keys = vec![PositionKey::new(d2, a1), PositionKey::new(d1, a2), PositionKey::new(d1, a1)];
        keys.sort();
        assert_eq!(keys, vec![PositionKey::new(d1, a1), PositionKey::new(d1, a2), PositionKey::new(d2, a1)]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn received(receipts: &[(Decimal, Decimal)]) -> StockPosition {
            let mut pos = StockPosition::empty(PositionKey::new(
                DepotId::from_uuid(uuid::Uuid::from_u128(1)),
                ArticleId::from_uuid(uuid::Uuid::from_u128(1)),
            ));
            for (quantity_kg, unit_cost) in receipts {
                pos.receive(*quantity_kg, *unit_cost, &mru(), *quantity_kg).unwrap();
            }
            pos
        }

        proptest! {
            /// Receiving the same lots in any order lands on Σ(q·c)/Σq.
            #[test]
            fn average_cost_is_independent_of_receipt_order(
                raw in prop::collection::vec((1i64..1_000_000, 0i64..100_000), 1..20),
                seed in any::<u64>(),
            ) {
                let receipts: Vec<(Decimal, Decimal)> =
                    raw.iter().map(|(q, c)| (Decimal::new(*q, 2), Decimal::new(*c, 2))).collect();

                let mut reordered = receipts.clone();
                reordered.rotate_left((seed as usize) % receipts.len());
                reordered.reverse();

                let forward = received(&receipts);
                let shuffled = received(&reordered);

                let total_value: Decimal = receipts.iter().map(|(q, c)| q * c).sum();
                let total_kg: Decimal = receipts.iter().map(|(q, _)| *q).sum();
                let expected = average_over(total_value, total_kg).unwrap();

                prop_assert_eq!(forward.quantity_kg(), shuffled.quantity_kg());
                prop_assert_eq!(forward.inventory_value(), total_value);
                prop_assert_eq!(forward.average_unit_cost(), expected);
                prop_assert_eq!(shuffled.average_unit_cost(), expected);
            }
        }
    }
}
