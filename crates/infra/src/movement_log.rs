//! Append-only log of applied movements.
//!
//! Every committed movement is appended here as a [`MovementApplied`] event
//! with a global, gap-free sequence number starting at 1. The log is the
//! replay source: folding it from an empty ledger reproduces the live lot
//! ledger and position store (see [`crate::replay`]).

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use lotledger_core::MovementId;
use lotledger_events::{Event, EventEnvelope};
use lotledger_inventory::MovementApplied;

/// A movement event persisted in the log (assigned a sequence number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMovement {
    pub event_id: Uuid,

    /// Position in the log.
    pub sequence_number: u64,

    pub recorded_at: DateTime<Utc>,

    pub event: MovementApplied,
}

impl StoredMovement {
    pub fn movement_id(&self) -> MovementId {
        self.event.movement_id
    }

    /// Convert into an envelope for publication on the bus.
    pub fn to_envelope(&self) -> EventEnvelope<MovementApplied> {
        EventEnvelope::new(
            self.event_id,
            self.event.movement_id,
            self.event.event_type(),
            self.sequence_number,
            self.event.clone(),
        )
    }
}

#[derive(Debug, Error)]
pub enum MovementLogError {
    #[error("movement {0} is already recorded")]
    Duplicate(MovementId),

    #[error("movement log lock poisoned")]
    Poisoned,
}

pub trait MovementLog: Send + Sync {
    /// Claim `movement_id` ahead of writing anything else for it.
    ///
    /// Fails with [`MovementLogError::Duplicate`] if the movement is logged or
    /// already claimed. A claim ends with `append` or `release`.
    fn reserve(&self, movement_id: MovementId) -> Result<(), MovementLogError>;

    /// Drop a claim whose movement will not be appended.
    fn release(&self, movement_id: MovementId);

    fn append(&self, event: MovementApplied) -> Result<StoredMovement, MovementLogError>;

    /// Entries with `sequence_number > after`, in order.
    fn read_from(&self, after: u64) -> Result<Vec<StoredMovement>, MovementLogError>;

    fn contains(&self, movement_id: MovementId) -> bool;

    /// Sequence number of the last entry; `0` when empty.
    fn last_sequence(&self) -> u64;

    fn load_all(&self) -> Result<Vec<StoredMovement>, MovementLogError> {
        self.read_from(0)
    }
}

impl<S> MovementLog for Arc<S>
where
    S: MovementLog + ?Sized,
{
    fn reserve(&self, movement_id: MovementId) -> Result<(), MovementLogError> {
        (**self).reserve(movement_id)
    }

    fn release(&self, movement_id: MovementId) {
        (**self).release(movement_id)
    }

    fn append(&self, event: MovementApplied) -> Result<StoredMovement, MovementLogError> {
        (**self).append(event)
    }

    fn read_from(&self, after: u64) -> Result<Vec<StoredMovement>, MovementLogError> {
        (**self).read_from(after)
    }

    fn contains(&self, movement_id: MovementId) -> bool {
        (**self).contains(movement_id)
    }

    fn last_sequence(&self) -> u64 {
        (**self).last_sequence()
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<StoredMovement>,
    movements: HashSet<MovementId>,
    reserved: HashSet<MovementId>,
}

/// In-memory append-only movement log.
#[derive(Debug, Default)]
pub struct InMemoryMovementLog {
    state: RwLock<LogState>,
}

impl InMemoryMovementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MovementLog for InMemoryMovementLog {
    fn reserve(&self, movement_id: MovementId) -> Result<(), MovementLogError> {
        let mut state = self.state.write().map_err(|_| MovementLogError::Poisoned)?;
        if state.movements.contains(&movement_id) || !state.reserved.insert(movement_id) {
            return Err(MovementLogError::Duplicate(movement_id));
        }
        Ok(())
    }

    fn release(&self, movement_id: MovementId) {
        if let Ok(mut state) = self.state.write() {
            state.reserved.remove(&movement_id);
        }
    }

    fn append(&self, event: MovementApplied) -> Result<StoredMovement, MovementLogError> {
        let mut state = self.state.write().map_err(|_| MovementLogError::Poisoned)?;

        if !state.movements.insert(event.movement_id) {
            return Err(MovementLogError::Duplicate(event.movement_id));
        }
        state.reserved.remove(&event.movement_id);

        let stored = StoredMovement {
            event_id: Uuid::now_v7(),
            sequence_number: state.entries.len() as u64 + 1,
            recorded_at: Utc::now(),
            event,
        };
        state.entries.push(stored.clone());
        Ok(stored)
    }

    fn read_from(&self, after: u64) -> Result<Vec<StoredMovement>, MovementLogError> {
        let state = self.state.read().map_err(|_| MovementLogError::Poisoned)?;
        // Sequence n lives at index n - 1.
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(state.entries.len());
        Ok(state.entries[start..].to_vec())
    }

    fn contains(&self, movement_id: MovementId) -> bool {
        self.state
            .read()
            .map(|s| s.movements.contains(&movement_id))
            .unwrap_or(false)
    }

    fn last_sequence(&self) -> u64 {
        self.state
            .read()
            .map(|s| s.entries.last().map(|e| e.sequence_number).unwrap_or(0))
            .unwrap_or(0)
    }
}
