use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotledger_core::{LotId, MovementId};
use lotledger_events::Event;

use crate::lot::Lot;
use crate::movement::MovementType;
use crate::position::{PositionKey, StockPosition};

/// One state change a committed movement makes to the ledger.
///
/// Replaying the effects of every logged movement in sequence order rebuilds
/// the lot ledger and the position store exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum LedgerEffect {
    LotCreated { lot: Lot },
    LotAllocated {
        lot_id: LotId,
        key: PositionKey,
        quantity_kg: Decimal,
    },
    /// Full state of the position after the movement.
    PositionChanged { position: StockPosition },
}

/// Event: a movement was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementApplied {
    pub movement_id: MovementId,
    pub movement_type: MovementType,
    pub occurred_at: DateTime<Utc>,
    pub effects: Vec<LedgerEffect>,
}

impl MovementApplied {
    pub fn affected_positions(&self) -> Vec<PositionKey> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                LedgerEffect::PositionChanged { position } => Some(position.key()),
                _ => None,
            })
            .collect()
    }
}

impl Event for MovementApplied {
    fn event_type(&self) -> &'static str {
        "inventory.movement.applied"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
