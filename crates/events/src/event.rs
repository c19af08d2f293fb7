use chrono::{DateTime, Utc};

/// A fact recorded by the ledger, such as an applied movement.
///
/// Events never change once logged; readers key their decoding on
/// `event_type` and `version`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "inventory.movement.applied").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
