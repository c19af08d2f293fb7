//! Movement planning: validation and the ledger effects it implies.
//!
//! The planner runs the whole movement against a scratch copy of the lots
//! and positions it touches, without mutating anything shared. The result is
//! either every error found or a [`MovementPlan`]: the ordered effects plus
//! the version each touched position had when planning started. Committing
//! the plan is the caller's job; it must re-check those versions under lock.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use lotledger_catalog::{Article, ArticleCatalog, DepotRegistry};
use lotledger_core::{AggregateRoot, ArticleId, CurrencyCode, DepotId, LotId, MovementId};

use crate::allocation::{AllocationStrategy, ExplicitLots, LotSource};
use crate::error::InventoryError;
use crate::events::{LedgerEffect, MovementApplied};
use crate::lot::{Lot, NewLot};
use crate::movement::{
    AdjustmentDelta, EntryLine, ExitLine, LotSelection, Movement, MovementKind, MovementType, TransferLine,
};
use crate::position::{PositionKey, StockPosition};
use crate::quantity::Quantity;

/// Committed ledger state, as the planner reads it.
pub trait LedgerView {
    fn lot(&self, id: LotId) -> Option<Lot>;

    /// Every lot ever created for `key`, in creation order.
    fn lots_at(&self, key: PositionKey) -> Vec<Lot>;

    fn position(&self, key: PositionKey) -> Option<StockPosition>;
}

/// Validated outcome of a movement, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub movement_id: MovementId,
    pub movement_type: MovementType,
    pub occurred_at: DateTime<Utc>,
    pub effects: Vec<LedgerEffect>,
    /// Version of each touched position when it was read.
    pub expected_versions: BTreeMap<PositionKey, u64>,
}

impl MovementPlan {
    /// Touched position keys in lock order.
    pub fn keys(&self) -> Vec<PositionKey> {
        self.expected_versions.keys().copied().collect()
    }

    pub fn positions(&self) -> Vec<StockPosition> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                LedgerEffect::PositionChanged { position } => Some(position.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn into_event(self) -> MovementApplied {
        MovementApplied {
            movement_id: self.movement_id,
            movement_type: self.movement_type,
            occurred_at: self.occurred_at,
            effects: self.effects,
        }
    }
}

pub struct MovementPlanner<'a> {
    ledger: &'a dyn LedgerView,
    articles: &'a dyn ArticleCatalog,
    depots: &'a dyn DepotRegistry,
}

impl<'a> MovementPlanner<'a> {
    pub fn new(ledger: &'a dyn LedgerView, articles: &'a dyn ArticleCatalog, depots: &'a dyn DepotRegistry) -> Self {
        Self {
            ledger,
            articles,
            depots,
        }
    }

    pub fn plan(&self, movement: &Movement) -> Result<MovementPlan, Vec<InventoryError>> {
        let mut errors = Vec::new();
        for depot_id in movement.kind().depots() {
            if self.depots.get_depot(depot_id).is_none() {
                errors.push(InventoryError::validation("depot_id", format!("unknown depot {depot_id}")));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut scratch = Scratch::new(self.ledger);
        let at = movement.occurred_at();

        // Each line runs on a copy so a failed line leaves no trace for the next.
        let mut run = |scratch: &mut Scratch<'a>, line: &dyn Fn(&mut Scratch<'a>) -> LineResult| {
            let mut attempt = scratch.clone();
            match line(&mut attempt) {
                Ok(()) => *scratch = attempt,
                Err(mut line_errors) => errors.append(&mut line_errors),
            }
        };

        match movement.kind() {
            MovementKind::Entry { depot_id, lines } => {
                for line in lines {
                    run(&mut scratch, &|s| self.entry_line(s, *depot_id, line, at));
                }
            }
            MovementKind::Transfer {
                source_depot,
                destination_depot,
                lines,
            } => {
                for line in lines {
                    run(&mut scratch, &|s| {
                        self.transfer_line(s, *source_depot, *destination_depot, line, at)
                    });
                }
            }
            MovementKind::Exit { depot_id, lines } => {
                for line in lines {
                    run(&mut scratch, &|s| self.exit_line(s, *depot_id, line));
                }
            }
            MovementKind::Adjustment {
                depot_id,
                article_id,
                delta,
            } => {
                run(&mut scratch, &|s| self.adjustment(s, *depot_id, *article_id, delta, at));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(scratch.into_plan(movement))
    }

    fn article(&self, article_id: ArticleId) -> Result<Article, InventoryError> {
        self.articles
            .get_article(article_id)
            .ok_or_else(|| InventoryError::validation("article_id", format!("unknown article {article_id}")))
    }

    fn receive(
        &self,
        scratch: &mut Scratch<'_>,
        depot_id: DepotId,
        article: &Article,
        receipt: Receipt,
        at: DateTime<Utc>,
    ) -> LineResult {
        let quantity_kg = receipt.quantity.to_kg(article).map_err(one)?;
        let currency = receipt
            .currency
            .unwrap_or_else(|| article.reference_cost_currency().clone());
        let key = PositionKey::new(depot_id, article.id_typed());

        let lot = Lot::create(
            LotId::new(),
            NewLot {
                article_id: key.article_id,
                depot_id,
                batch_number: receipt.batch_number,
                quantity_kg,
                unit_cost: receipt.unit_cost,
                cost_currency: currency.clone(),
                source_lot: None,
                created_at: at,
            },
        )
        .map_err(one)?;

        let commercialisable = if receipt.quarantined { Decimal::ZERO } else { quantity_kg };
        scratch
            .position_mut(key)
            .receive(quantity_kg, receipt.unit_cost, &currency, commercialisable)
            .map_err(one)?;
        scratch.create_lot(lot);
        Ok(())
    }

    fn entry_line(&self, scratch: &mut Scratch<'_>, depot_id: DepotId, line: &EntryLine, at: DateTime<Utc>) -> LineResult {
        let article = self.article(line.article_id).map_err(one)?;
        self.receive(
            scratch,
            depot_id,
            &article,
            Receipt {
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                currency: line.currency.clone(),
                batch_number: line.batch_number.clone(),
                quarantined: line.quarantined,
            },
            at,
        )
    }

    fn transfer_line(
        &self,
        scratch: &mut Scratch<'_>,
        source: DepotId,
        destination: DepotId,
        line: &TransferLine,
        at: DateTime<Utc>,
    ) -> LineResult {
        let article = self.article(line.article_id).map_err(one)?;
        let requested_kg = line.quantity.to_kg(&article).map_err(one)?;
        let source_key = PositionKey::new(source, line.article_id);
        let destination_key = PositionKey::new(destination, line.article_id);

        scratch.pin(source_key);
        let selections = line.allocation.strategy().select(source_key, requested_kg, &*scratch)?;
        let (drawn, split) = scratch.draw(source_key, &selections).map_err(one)?;

        // Sellable stock stays sellable on arrival, quarantined stays quarantined.
        let mut sellable_left = split;
        for source_lot in drawn {
            let quantity_kg = source_lot.quantity_kg;
            let sellable = quantity_kg.min(sellable_left);
            sellable_left -= sellable;

            let lot = Lot::create(
                LotId::new(),
                NewLot {
                    article_id: line.article_id,
                    depot_id: destination,
                    batch_number: source_lot.lot.batch_number().map(str::to_string),
                    quantity_kg,
                    unit_cost: source_lot.lot.unit_cost(),
                    cost_currency: source_lot.lot.cost_currency().clone(),
                    source_lot: Some(source_lot.lot.id_typed()),
                    created_at: at,
                },
            )
            .map_err(one)?;

            scratch
                .position_mut(destination_key)
                .receive(quantity_kg, lot.unit_cost(), lot.cost_currency(), sellable)
                .map_err(one)?;
            scratch.create_lot(lot);
        }
        Ok(())
    }

    fn exit_line(&self, scratch: &mut Scratch<'_>, depot_id: DepotId, line: &ExitLine) -> LineResult {
        self.article(line.article_id).map_err(one)?;
        self.decrease(scratch, PositionKey::new(depot_id, line.article_id), line.quantity_kg, &line.lots)
    }

    fn decrease(&self, scratch: &mut Scratch<'_>, key: PositionKey, quantity_kg: Decimal, lots: &[LotSelection]) -> LineResult {
        if lots.is_empty() {
            return Err(vec![InventoryError::MissingLotSelection {
                article_id: key.article_id,
                depot_id: key.depot_id,
                quantity_kg,
            }]);
        }
        scratch.pin(key);
        let selections = ExplicitLots::new(lots).select(key, quantity_kg, &*scratch)?;
        scratch.draw(key, &selections).map_err(one)?;
        Ok(())
    }

    fn adjustment(
        &self,
        scratch: &mut Scratch<'_>,
        depot_id: DepotId,
        article_id: ArticleId,
        delta: &AdjustmentDelta,
        at: DateTime<Utc>,
    ) -> LineResult {
        let article = self.article(article_id).map_err(one)?;
        let key = PositionKey::new(depot_id, article_id);

        match delta {
            AdjustmentDelta::Increase {
                quantity,
                unit_cost,
                currency,
                batch_number,
            } => self.receive(
                scratch,
                depot_id,
                &article,
                Receipt {
                    quantity: *quantity,
                    unit_cost: *unit_cost,
                    currency: currency.clone(),
                    batch_number: batch_number.clone(),
                    quarantined: false,
                },
                at,
            ),
            AdjustmentDelta::Decrease { quantity_kg, lots } => self.decrease(scratch, key, *quantity_kg, lots),
            AdjustmentDelta::Commercialisable { delta_kg } => {
                scratch.position_mut(key).shift_commercialisable(*delta_kg).map_err(one)
            }
        }
    }
}

type LineResult = Result<(), Vec<InventoryError>>;

fn one(error: InventoryError) -> Vec<InventoryError> {
    vec![error]
}

struct Receipt {
    quantity: Quantity,
    unit_cost: Decimal,
    currency: Option<CurrencyCode>,
    batch_number: Option<String>,
    quarantined: bool,
}

/// A lot as it was just before a draw, and how much was drawn from it.
struct Drawn {
    lot: Lot,
    quantity_kg: Decimal,
}

/// Working state of one planning run.
#[derive(Clone)]
struct Scratch<'a> {
    ledger: &'a dyn LedgerView,
    /// Existing lots drawn from during this run.
    touched: HashMap<LotId, Lot>,
    /// Committed lots as first read; later reads of the same lot see this copy.
    seen: RefCell<HashMap<LotId, Lot>>,
    created: Vec<Lot>,
    positions: BTreeMap<PositionKey, StockPosition>,
    base_versions: BTreeMap<PositionKey, u64>,
    effects: Vec<LedgerEffect>,
}

impl<'a> Scratch<'a> {
    fn new(ledger: &'a dyn LedgerView) -> Self {
        Self {
            ledger,
            touched: HashMap::new(),
            seen: RefCell::new(HashMap::new()),
            created: Vec::new(),
            positions: BTreeMap::new(),
            base_versions: BTreeMap::new(),
            effects: Vec::new(),
        }
    }

    fn position_mut(&mut self, key: PositionKey) -> &mut StockPosition {
        let ledger = self.ledger;
        let base_versions = &mut self.base_versions;
        self.positions.entry(key).or_insert_with(|| {
            let position = ledger.position(key).unwrap_or_else(|| StockPosition::empty(key));
            base_versions.insert(key, position.version());
            position
        })
    }

    /// Record the version of `key` before any of its lots are read.
    ///
    /// Commits write lots before positions, so lots read after this are at
    /// least as new as the recorded version; a commit in between shows up as a
    /// version mismatch rather than a stale allocation.
    fn pin(&mut self, key: PositionKey) {
        self.position_mut(key);
    }

    fn snapshot(&self, lot: Lot) -> Lot {
        self.seen.borrow_mut().entry(lot.id_typed()).or_insert(lot).clone()
    }

    fn create_lot(&mut self, lot: Lot) {
        self.effects.push(LedgerEffect::LotCreated { lot: lot.clone() });
        self.created.push(lot);
    }

    /// Allocate `selections` from lots of `key` and release the total from
    /// the position. Returns the drawn lots and the sellable share released.
    fn draw(&mut self, key: PositionKey, selections: &[LotSelection]) -> Result<(Vec<Drawn>, Decimal), InventoryError> {
        let mut drawn = Vec::with_capacity(selections.len());
        let mut quantity_kg = Decimal::ZERO;
        let mut value = Decimal::ZERO;

        for selection in selections {
            let mut lot = self
                .lot(selection.lot_id)
                .ok_or(InventoryError::UnknownLot { lot_id: selection.lot_id })?;
            let before = lot.clone();
            lot.allocate(selection.quantity_kg)?;

            let overflow = || InventoryError::overflow("quantity_kg");
            quantity_kg = quantity_kg.checked_add(selection.quantity_kg).ok_or_else(overflow)?;
            value = selection
                .quantity_kg
                .checked_mul(lot.unit_cost())
                .and_then(|drawn| value.checked_add(drawn))
                .ok_or_else(overflow)?;
            self.effects.push(LedgerEffect::LotAllocated {
                lot_id: selection.lot_id,
                key,
                quantity_kg: selection.quantity_kg,
            });
            self.store_lot(lot);
            drawn.push(Drawn {
                lot: before,
                quantity_kg: selection.quantity_kg,
            });
        }

        let split = self.position_mut(key).release(quantity_kg, value)?;
        Ok((drawn, split.commercialisable_kg))
    }

    fn store_lot(&mut self, lot: Lot) {
        if let Some(created) = self.created.iter_mut().find(|l| l.id_typed() == lot.id_typed()) {
            *created = lot;
        } else {
            self.touched.insert(lot.id_typed(), lot);
        }
    }

    fn into_plan(self, movement: &Movement) -> MovementPlan {
        let mut effects = self.effects;
        for (_, mut position) in self.positions {
            position.advance_version();
            effects.push(LedgerEffect::PositionChanged { position });
        }

        MovementPlan {
            movement_id: movement.id(),
            movement_type: movement.movement_type(),
            occurred_at: movement.occurred_at(),
            effects,
            expected_versions: self.base_versions,
        }
    }
}

impl LotSource for Scratch<'_> {
    fn lot(&self, id: LotId) -> Option<Lot> {
        if let Some(lot) = self.touched.get(&id) {
            return Some(lot.clone());
        }
        if let Some(lot) = self.created.iter().find(|l| l.id_typed() == id) {
            return Some(lot.clone());
        }
        if let Some(lot) = self.seen.borrow().get(&id) {
            return Some(lot.clone());
        }
        self.ledger.lot(id).map(|lot| self.snapshot(lot))
    }

    fn available(&self, key: PositionKey) -> Vec<Lot> {
        let mut lots: Vec<Lot> = self
            .ledger
            .lots_at(key)
            .into_iter()
            .map(|lot| match self.touched.get(&lot.id_typed()) {
                Some(touched) => touched.clone(),
                None => self.snapshot(lot),
            })
            .chain(self.created.iter().filter(|l| l.key() == key).cloned())
            .filter(Lot::is_available)
            .collect();
        // Stable: lots created at the same instant keep insertion order.
        lots.sort_by_key(Lot::created_at);
        lots
    }
}
