//! Rebuild the ledger from the movement log.
//!
//! Folding the logged effects in sequence order from an empty ledger yields a
//! lot ledger and position store equal to the live ones.

use serde::Serialize;
use thiserror::Error;

use lotledger_inventory::{InventoryError, LedgerEffect};

use crate::lot_ledger::{InMemoryLotLedger, LotLedger};
use crate::movement_log::{MovementLog, MovementLogError};
use crate::position_store::{InMemoryPositionStore, PositionStore};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("movement log error: {0}")]
    Log(#[from] MovementLogError),

    #[error("movement #{sequence} could not be replayed: {source}")]
    Ledger {
        sequence: u64,
        #[source]
        source: InventoryError,
    },

    #[error("movement log out of order: expected #{expected}, found #{found}")]
    OutOfOrder { expected: u64, found: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub movements: u64,
    pub last_sequence: u64,
}

/// Replay the whole log into fresh in-memory stores.
pub fn replay<M: MovementLog>(log: &M) -> Result<(InMemoryLotLedger, InMemoryPositionStore, ReplayReport), ReplayError> {
    let lots = InMemoryLotLedger::new();
    let positions = InMemoryPositionStore::new();
    let report = replay_into(log, &lots, &positions)?;
    Ok((lots, positions, report))
}

/// Replay the log into the given stores.
///
/// `lots` must be empty; `positions` is cleared first.
pub fn replay_into<M, L, P>(log: &M, lots: &L, positions: &P) -> Result<ReplayReport, ReplayError>
where
    M: MovementLog,
    L: LotLedger,
    P: PositionStore,
{
    positions.clear();

    let mut report = ReplayReport {
        movements: 0,
        last_sequence: 0,
    };
    for stored in log.load_all()? {
        let expected = report.last_sequence + 1;
        if stored.sequence_number != expected {
            return Err(ReplayError::OutOfOrder {
                expected,
                found: stored.sequence_number,
            });
        }

        lots.apply(&stored.event.effects).map_err(|source| ReplayError::Ledger {
            sequence: stored.sequence_number,
            source,
        })?;
        positions.upsert_all(
            stored
                .event
                .effects
                .iter()
                .filter_map(|effect| match effect {
                    LedgerEffect::PositionChanged { position } => Some(position.clone()),
                    _ => None,
                })
                .collect(),
        );

        report.movements += 1;
        report.last_sequence = stored.sequence_number;
    }

    tracing::info!(movements = report.movements, last_sequence = report.last_sequence, "ledger replayed");
    Ok(report)
}

/// Whether the rebuilt stores hold exactly the live state.
pub fn matches_live<L1, P1, L2, P2>(live_lots: &L1, live_positions: &P1, lots: &L2, positions: &P2) -> bool
where
    L1: LotLedger,
    P1: PositionStore,
    L2: LotLedger,
    P2: PositionStore,
{
    live_lots.all() == lots.all() && live_positions.list() == positions.list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lotledger_core::{ArticleId, CurrencyCode, DepotId, LotId, MovementId};
    use lotledger_inventory::{Lot, MovementApplied, MovementType, NewLot, PositionKey, StockPosition};
    use rust_decimal_macros::dec;

    use crate::movement_log::InMemoryMovementLog;

    fn entry(key: PositionKey) -> MovementApplied {
        let lot = Lot::create(
            LotId::new(),
            NewLot {
                article_id: key.article_id,
                depot_id: key.depot_id,
                batch_number: Some("B-17".into()),
                quantity_kg: dec!(100),
                unit_cost: dec!(9),
                cost_currency: CurrencyCode::mru(),
                source_lot: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        let mut position = StockPosition::empty(key);
        position.receive(dec!(100), dec!(9), &CurrencyCode::mru(), dec!(100)).unwrap();
        position.advance_version();

        MovementApplied {
            movement_id: MovementId::new(),
            movement_type: MovementType::Entry,
            occurred_at: Utc::now(),
            effects: vec![
                LedgerEffect::LotCreated { lot },
                LedgerEffect::PositionChanged { position },
            ],
        }
    }

    #[test]
    fn rebuilds_lots_and_positions() {
        let log = InMemoryMovementLog::new();
        let key = PositionKey::new(DepotId::new(), ArticleId::new());
        log.append(entry(key)).unwrap();

        let (lots, positions, report) = replay(&log).unwrap();

        assert_eq!(report, ReplayReport { movements: 1, last_sequence: 1 });
        assert_eq!(lots.len(), 1);
        assert_eq!(positions.get(&key).unwrap().quantity_kg(), dec!(100));
    }

    #[test]
    fn a_replayed_lot_cannot_be_created_twice() {
        let log = InMemoryMovementLog::new();
        let key = PositionKey::new(DepotId::new(), ArticleId::new());
        log.append(entry(key)).unwrap();

        let (lots, positions, _) = replay(&log).unwrap();
        let err = replay_into(&log, &lots, &positions).unwrap_err();
        assert!(matches!(err, ReplayError::Ledger { sequence: 1, .. }));
    }
}
