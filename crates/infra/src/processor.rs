//! Movement processing pipeline.
//!
//! ```text
//! Movement
//!   ↓
//! 1. Plan against committed state (no locks; pure, collects every error)
//!   ↓
//! 2. Lock every touched position, in key order (bounded wait)
//!   ↓
//! 3. Re-check the versions the plan was built on
//!   ↓
//! 4. Apply lot effects, write positions, append to the movement log
//!   ↓
//! 5. Release locks, publish the logged event on the bus
//! ```
//!
//! A version mismatch or lock timeout means another movement got there first:
//! the whole movement is re-planned from fresh state, up to the configured
//! number of retries. Any other error rejects the movement with nothing
//! written.
//!
//! Publication happens after the movement is durable in the log. A failed
//! publish is logged and does not undo the movement (subscribers can catch
//! up from the log).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use lotledger_catalog::{ArticleCatalog, DepotRegistry};
use lotledger_core::{ArticleId, CurrencyCode, DepotId, DomainError, ExpectedVersion, LotId, MovementId};
use lotledger_events::{EventBus, EventEnvelope};
use lotledger_inventory::{
    AdjustmentDelta, InventoryError, LedgerView, Lot, LotSelection, Movement, MovementApplied, MovementKind,
    MovementPlan, MovementPlanner, MovementRejection, MovementStatus, MovementType, PositionKey, StockPosition,
};

use crate::config::EngineConfig;
use crate::locks::PositionLocks;
use crate::lot_ledger::LotLedger;
use crate::movement_log::{MovementLog, MovementLogError, StoredMovement};
use crate::position_store::PositionStore;

/// Outcome of an applied movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub movement_id: MovementId,
    pub movement_type: MovementType,
    pub status: MovementStatus,
    /// Position of the movement in the log.
    pub sequence_number: u64,
    /// Planning rounds it took (1 unless it hit a concurrent writer).
    pub attempts: u32,
    /// State of every touched position after the movement.
    pub affected_positions: Vec<StockPosition>,
}

/// Manual correction of one position.
///
/// A positive `delta_kg` opens a lot at `unit_cost`; a negative one must name
/// the lots to draw from. With `commercialisable` set, the delta instead moves
/// stock out of (`> 0`) or into (`< 0`) quarantine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAdjustment {
    pub depot_id: DepotId,
    pub article_id: ArticleId,
    pub delta_kg: Decimal,
    #[serde(default)]
    pub lots: Option<Vec<LotSelection>>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub commercialisable: bool,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl PositionAdjustment {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.depot_id, self.article_id)
    }

    fn delta(&self) -> Result<AdjustmentDelta, InventoryError> {
        if self.commercialisable {
            return Ok(AdjustmentDelta::Commercialisable { delta_kg: self.delta_kg });
        }
        AdjustmentDelta::from_signed(
            self.depot_id,
            self.article_id,
            self.delta_kg,
            self.lots.clone(),
            self.unit_cost,
            self.currency.clone(),
        )
    }
}

/// Committed state as seen by the planner.
struct CommittedView<'a, L, P> {
    lots: &'a L,
    positions: &'a P,
}

impl<L: LotLedger, P: PositionStore> LedgerView for CommittedView<'_, L, P> {
    fn lot(&self, id: LotId) -> Option<Lot> {
        self.lots.get(id)
    }

    fn lots_at(&self, key: PositionKey) -> Vec<Lot> {
        self.lots.lots_at(key)
    }

    fn position(&self, key: PositionKey) -> Option<StockPosition> {
        self.positions.get(&key)
    }
}

/// Plans, locks, commits and publishes movements.
///
/// ## Generic Parameters
///
/// - `L`: lot ledger
/// - `P`: position store
/// - `M`: movement log
/// - `B`: event bus carrying logged movements
pub struct MovementProcessor<L, P, M, B> {
    lots: L,
    positions: P,
    log: M,
    bus: B,
    articles: Arc<dyn ArticleCatalog>,
    depots: Arc<dyn DepotRegistry>,
    locks: PositionLocks,
    conflict_retries: u32,
}

impl<L, P, M, B> MovementProcessor<L, P, M, B> {
    pub fn new<C>(lots: L, positions: P, log: M, bus: B, catalog: Arc<C>, config: &EngineConfig) -> Self
    where
        C: ArticleCatalog + DepotRegistry + 'static,
    {
        let articles: Arc<dyn ArticleCatalog> = catalog.clone();
        let depots: Arc<dyn DepotRegistry> = catalog;
        Self {
            lots,
            positions,
            log,
            bus,
            articles,
            depots,
            locks: PositionLocks::new(config.lock_timeout),
            conflict_retries: config.conflict_retries,
        }
    }

    pub fn lots(&self) -> &L {
        &self.lots
    }

    pub fn positions(&self) -> &P {
        &self.positions
    }

    pub fn log(&self) -> &M {
        &self.log
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<L, P, M, B> MovementProcessor<L, P, M, B>
where
    L: LotLedger,
    P: PositionStore,
    M: MovementLog,
    B: EventBus<EventEnvelope<MovementApplied>>,
{
    /// Build and apply a movement dated `occurred_at` (now when absent).
    pub fn submit(
        &self,
        kind: MovementKind,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<MovementReceipt, MovementRejection> {
        let movement = Movement::new(MovementId::new(), kind, occurred_at.unwrap_or_else(Utc::now))?;
        self.apply_movement(movement)
    }

    /// Apply a movement atomically, or reject it with every error found.
    #[instrument(skip_all, fields(movement_id = %movement.id(), kind = movement.movement_type().as_str()))]
    pub fn apply_movement(&self, movement: Movement) -> Result<MovementReceipt, MovementRejection> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut attempt = movement.redraft();

            match self.try_apply(&mut attempt) {
                Ok((stored, affected_positions)) => {
                    info!(
                        sequence = stored.sequence_number,
                        lines = movement.kind().line_count(),
                        positions = affected_positions.len(),
                        attempts,
                        "movement applied"
                    );
                    self.publish(&stored);
                    return Ok(MovementReceipt {
                        movement_id: movement.id(),
                        movement_type: movement.movement_type(),
                        status: attempt.status(),
                        sequence_number: stored.sequence_number,
                        attempts,
                        affected_positions,
                    });
                }
                Err(rejection) if rejection.is_retryable() && attempts <= self.conflict_retries => {
                    debug!(attempt = attempts, reason = ?rejection.first().map(InventoryError::code), "concurrent writer; re-planning");
                }
                Err(mut rejection) => {
                    if let Err(err) = attempt.mark_rejected() {
                        warn!(status = ?attempt.status(), error = %err, "rejected movement kept its status");
                    }
                    rejection.status = attempt.status();
                    warn!(
                        attempts,
                        errors = rejection.errors.len(),
                        first = ?rejection.first().map(InventoryError::code),
                        "movement rejected"
                    );
                    return Err(rejection);
                }
            }
        }
    }

    /// Apply a manual adjustment and return the adjusted position.
    pub fn adjust_position(&self, adjustment: PositionAdjustment) -> Result<StockPosition, MovementRejection> {
        let movement_id = MovementId::new();
        let key = adjustment.key();
        let delta = adjustment
            .delta()
            .map_err(|e| MovementRejection::single(Some(movement_id), e))?;

        let movement = Movement::new(
            movement_id,
            MovementKind::Adjustment {
                depot_id: adjustment.depot_id,
                article_id: adjustment.article_id,
                delta,
            },
            adjustment.occurred_at.unwrap_or_else(Utc::now),
        )?;

        self.apply_movement(movement)?
            .affected_positions
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| {
                MovementRejection::single(
                    Some(movement_id),
                    InventoryError::Domain(DomainError::invariant("adjustment did not touch its position")),
                )
            })
    }

    fn try_apply(&self, movement: &mut Movement) -> Result<(StoredMovement, Vec<StockPosition>), MovementRejection> {
        let id = movement.id();
        let reject = move |errors: Vec<InventoryError>| MovementRejection::new(Some(id), errors);

        let view = CommittedView {
            lots: &self.lots,
            positions: &self.positions,
        };
        let plan = MovementPlanner::new(&view, &*self.articles, &*self.depots)
            .plan(movement)
            .map_err(reject)?;
        movement.mark_validated().map_err(|e| reject(vec![e.into()]))?;

        let committed = self
            .locks
            .with_locked(&plan.keys(), || self.commit(plan))
            .map_err(|e| reject(vec![e]))?;
        let committed = committed.map_err(|e| reject(vec![e]))?;

        movement.mark_applied().map_err(|e| reject(vec![e.into()]))?;
        Ok(committed)
    }

    /// Runs with every touched position locked.
    ///
    /// The movement id is claimed in the log before anything is written, so a
    /// second submission of the same id fails even when it locks other positions.
    fn commit(&self, plan: MovementPlan) -> Result<(StoredMovement, Vec<StockPosition>), InventoryError> {
        let movement_id = plan.movement_id;
        self.log.reserve(movement_id).map_err(|err| match err {
            MovementLogError::Duplicate(id) => {
                InventoryError::Domain(DomainError::conflict(format!("movement {id} was already applied")))
            }
            other => InventoryError::Domain(DomainError::invariant(other.to_string())),
        })?;

        let written = self.write(plan);
        if written.is_err() {
            self.log.release(movement_id);
        }
        written
    }

    fn write(&self, plan: MovementPlan) -> Result<(StoredMovement, Vec<StockPosition>), InventoryError> {
        for (key, expected) in &plan.expected_versions {
            let actual = self.positions.version(key);
            if !ExpectedVersion::Exact(*expected).matches(actual) {
                return Err(InventoryError::ConcurrentModification {
                    depot_id: key.depot_id,
                    article_id: key.article_id,
                    expected_version: *expected,
                    actual_version: actual,
                });
            }
        }

        self.lots.apply(&plan.effects)?;
        let positions = plan.positions();
        self.positions.upsert_all(positions.clone());

        let stored = self
            .log
            .append(plan.into_event())
            .map_err(|e| InventoryError::Domain(DomainError::invariant(e.to_string())))?;
        Ok((stored, positions))
    }

    fn publish(&self, stored: &StoredMovement) {
        if let Err(err) = self.bus.publish(stored.to_envelope()) {
            warn!(sequence = stored.sequence_number, error = ?err, "movement logged but not published");
        }
    }
}
