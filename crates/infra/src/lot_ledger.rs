//! Lot Ledger: the single source of truth for per-lot remaining quantity.
//!
//! Lots are appended, never removed; only `remaining_quantity_kg` moves, and
//! only down. Committing a movement's lot effects is all-or-nothing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;

use lotledger_core::{ArticleId, DepotId, DomainError, LotId};
use lotledger_inventory::{InventoryError, InventoryResult, LedgerEffect, Lot, NewLot, PositionKey};

pub trait LotLedger: Send + Sync {
    fn create_lot(&self, new: NewLot) -> InventoryResult<Lot>;

    fn allocate(&self, lot_id: LotId, quantity_kg: Decimal) -> InventoryResult<()>;

    /// Lots of the pair with stock left, oldest first.
    fn list_available(&self, article_id: ArticleId, depot_id: DepotId) -> Vec<Lot>;

    fn get(&self, lot_id: LotId) -> Option<Lot>;

    /// Every lot of the position, drained or not, in creation order.
    fn lots_at(&self, key: PositionKey) -> Vec<Lot>;

    fn all(&self) -> Vec<Lot>;

    /// Apply the lot effects of a committed movement (other effects are ignored).
    ///
    /// Either every effect applies or none does.
    fn apply(&self, effects: &[LedgerEffect]) -> InventoryResult<()>;
}

impl<S> LotLedger for Arc<S>
where
    S: LotLedger + ?Sized,
{
    fn create_lot(&self, new: NewLot) -> InventoryResult<Lot> {
        (**self).create_lot(new)
    }

    fn allocate(&self, lot_id: LotId, quantity_kg: Decimal) -> InventoryResult<()> {
        (**self).allocate(lot_id, quantity_kg)
    }

    fn list_available(&self, article_id: ArticleId, depot_id: DepotId) -> Vec<Lot> {
        (**self).list_available(article_id, depot_id)
    }

    fn get(&self, lot_id: LotId) -> Option<Lot> {
        (**self).get(lot_id)
    }

    fn lots_at(&self, key: PositionKey) -> Vec<Lot> {
        (**self).lots_at(key)
    }

    fn all(&self) -> Vec<Lot> {
        (**self).all()
    }

    fn apply(&self, effects: &[LedgerEffect]) -> InventoryResult<()> {
        (**self).apply(effects)
    }
}

#[derive(Debug, Default, Clone)]
struct LotTable {
    lots: Vec<Lot>,
    index: HashMap<LotId, usize>,
    by_key: HashMap<PositionKey, Vec<usize>>,
}

impl LotTable {
    fn push(&mut self, lot: Lot) -> InventoryResult<()> {
        let id = lot.id_typed();
        if self.index.contains_key(&id) {
            return Err(InventoryError::Domain(DomainError::conflict(format!("lot {id} already exists"))));
        }
        let slot = self.lots.len();
        self.by_key.entry(lot.key()).or_default().push(slot);
        self.index.insert(id, slot);
        self.lots.push(lot);
        Ok(())
    }

    fn get_mut(&mut self, lot_id: LotId) -> InventoryResult<&mut Lot> {
        let slot = *self.index.get(&lot_id).ok_or(InventoryError::UnknownLot { lot_id })?;
        Ok(&mut self.lots[slot])
    }

    fn at(&self, key: PositionKey) -> impl Iterator<Item = &Lot> {
        self.by_key
            .get(&key)
            .into_iter()
            .flatten()
            .map(|slot| &self.lots[*slot])
    }
}

/// In-memory lot ledger.
#[derive(Debug, Default)]
pub struct InMemoryLotLedger {
    table: RwLock<LotTable>,
}

impl InMemoryLotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.lots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> InventoryError {
    InventoryError::Domain(DomainError::invariant("lot ledger lock poisoned"))
}

impl LotLedger for InMemoryLotLedger {
    fn create_lot(&self, new: NewLot) -> InventoryResult<Lot> {
        let lot = Lot::create(LotId::new(), new)?;
        let mut table = self.table.write().map_err(|_| poisoned())?;
        table.push(lot.clone())?;
        Ok(lot)
    }

    fn allocate(&self, lot_id: LotId, quantity_kg: Decimal) -> InventoryResult<()> {
        let mut table = self.table.write().map_err(|_| poisoned())?;
        table.get_mut(lot_id)?.allocate(quantity_kg)
    }

    fn list_available(&self, article_id: ArticleId, depot_id: DepotId) -> Vec<Lot> {
        let Ok(table) = self.table.read() else {
            return vec![];
        };
        let mut lots: Vec<Lot> = table
            .at(PositionKey::new(depot_id, article_id))
            .filter(|lot| lot.is_available())
            .cloned()
            .collect();
        lots.sort_by_key(Lot::created_at);
        lots
    }

    fn get(&self, lot_id: LotId) -> Option<Lot> {
        let table = self.table.read().ok()?;
        table.index.get(&lot_id).map(|slot| table.lots[*slot].clone())
    }

    fn lots_at(&self, key: PositionKey) -> Vec<Lot> {
        match self.table.read() {
            Ok(table) => table.at(key).cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn all(&self) -> Vec<Lot> {
        self.table.read().map(|t| t.lots.clone()).unwrap_or_default()
    }

    fn apply(&self, effects: &[LedgerEffect]) -> InventoryResult<()> {
        let mut table = self.table.write().map_err(|_| poisoned())?;

        // Stage on a copy of the touched lots, swap in only if everything held.
        let mut staged: HashMap<LotId, Lot> = HashMap::new();
        let mut created: Vec<Lot> = Vec::new();
        for effect in effects {
            match effect {
                LedgerEffect::LotCreated { lot } => {
                    if table.index.contains_key(&lot.id_typed()) || created.iter().any(|l| l.id_typed() == lot.id_typed()) {
                        return Err(InventoryError::Domain(DomainError::conflict(format!(
                            "lot {} already exists",
                            lot.id_typed()
                        ))));
                    }
                    created.push(lot.clone());
                }
                LedgerEffect::LotAllocated { lot_id, key, quantity_kg } => {
                    let lot = match staged.get_mut(lot_id) {
                        Some(lot) => lot,
                        None => {
                            let current = match created.iter().find(|l| l.id_typed() == *lot_id) {
                                Some(lot) => lot.clone(),
                                None => table.get_mut(*lot_id)?.clone(),
                            };
                            staged.entry(*lot_id).or_insert(current)
                        }
                    };
                    if lot.key() != *key {
                        return Err(InventoryError::LotMismatch {
                            lot_id: *lot_id,
                            expected_article: key.article_id,
                            expected_depot: key.depot_id,
                            actual_article: lot.article_id(),
                            actual_depot: lot.depot_id(),
                        });
                    }
                    lot.allocate(*quantity_kg)?;
                }
                LedgerEffect::PositionChanged { .. } => {}
            }
        }

        for lot in created {
            let id = lot.id_typed();
            match staged.remove(&id) {
                Some(drawn) => table.push(drawn)?,
                None => table.push(lot)?,
            }
        }
        for (lot_id, lot) in staged {
            *table.get_mut(lot_id)? = lot;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use lotledger_core::CurrencyCode;
    use rust_decimal_macros::dec;

    fn new_lot(key: PositionKey, kg: Decimal) -> NewLot {
        NewLot {
            article_id: key.article_id,
            depot_id: key.depot_id,
            batch_number: None,
            quantity_kg: kg,
            unit_cost: dec!(10),
            cost_currency: CurrencyCode::mru(),
            source_lot: None,
            created_at: Utc::now(),
        }
    }

    fn key() -> PositionKey {
        PositionKey::new(DepotId::new(), ArticleId::new())
    }

    #[test]
    fn create_then_allocate() {
        let ledger = InMemoryLotLedger::new();
        let key = key();
        let lot = ledger.create_lot(new_lot(key, dec!(1000))).unwrap();

        ledger.allocate(lot.id_typed(), dec!(300)).unwrap();
        assert_eq!(ledger.get(lot.id_typed()).unwrap().remaining_quantity_kg(), dec!(700));

        let err = ledger.allocate(lot.id_typed(), dec!(701)).unwrap_err();
        assert_eq!(err.code(), "insufficient_lot_quantity");
        assert!(ledger.create_lot(new_lot(key, dec!(0))).is_err());
    }

    #[test]
    fn lists_available_oldest_first() {
        let ledger = InMemoryLotLedger::new();
        let key = key();

        let mut late = new_lot(key, dec!(5));
        late.created_at = Utc::now() + Duration::minutes(5);
        let late = ledger.create_lot(late).unwrap();
        let early = ledger.create_lot(new_lot(key, dec!(5))).unwrap();
        let drained = ledger.create_lot(new_lot(key, dec!(5))).unwrap();
        ledger.allocate(drained.id_typed(), dec!(5)).unwrap();
        ledger.create_lot(new_lot(PositionKey::new(DepotId::new(), key.article_id), dec!(5))).unwrap();

        let ids: Vec<_> = ledger
            .list_available(key.article_id, key.depot_id)
            .iter()
            .map(Lot::id_typed)
            .collect();
        assert_eq!(ids, vec![early.id_typed(), late.id_typed()]);
        assert_eq!(ledger.lots_at(key).len(), 3);
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let ledger = InMemoryLotLedger::new();
        let key = key();
        let a = ledger.create_lot(new_lot(key, dec!(10))).unwrap();
        let b = ledger.create_lot(new_lot(key, dec!(10))).unwrap();
        let fresh = Lot::create(LotId::new(), new_lot(key, dec!(3))).unwrap();

        let effects = vec![
            LedgerEffect::LotAllocated { lot_id: a.id_typed(), key, quantity_kg: dec!(4) },
            LedgerEffect::LotCreated { lot: fresh.clone() },
            LedgerEffect::LotAllocated { lot_id: b.id_typed(), key, quantity_kg: dec!(11) },
        ];
        assert!(ledger.apply(&effects).is_err());
        assert_eq!(ledger.get(a.id_typed()).unwrap().remaining_quantity_kg(), dec!(10));
        assert!(ledger.get(fresh.id_typed()).is_none());

        let effects = vec![
            LedgerEffect::LotAllocated { lot_id: a.id_typed(), key, quantity_kg: dec!(4) },
            LedgerEffect::LotAllocated { lot_id: a.id_typed(), key, quantity_kg: dec!(6) },
            LedgerEffect::LotCreated { lot: fresh.clone() },
        ];
        ledger.apply(&effects).unwrap();
        assert!(!ledger.get(a.id_typed()).unwrap().is_available());
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn apply_rejects_allocation_against_wrong_position() {
        let ledger = InMemoryLotLedger::new();
        let lot = ledger.create_lot(new_lot(key(), dec!(10))).unwrap();

        let effects = vec![LedgerEffect::LotAllocated { lot_id: lot.id_typed(), key: key(), quantity_kg: dec!(1) }];
        assert_eq!(ledger.apply(&effects).unwrap_err().code(), "lot_mismatch");
    }
}
