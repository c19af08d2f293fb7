use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lotledger_core::MovementId;

/// Envelope for a published ledger event.
///
/// Notes:
/// - `sequence_number` is the position of the event in the append-only
///   movement log (global, gap-free, starting at 1).
/// - `movement_id` links the event back to the movement that produced it.
/// - `payload` is the serialized event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    movement_id: MovementId,
    event_type: String,

    /// Monotonically increasing position in the movement log.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        movement_id: MovementId,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            movement_id,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn movement_id(&self) -> MovementId {
        self.movement_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
