//! Ledger events and post-commit notification plumbing.
//!
//! Applied movements are recorded as events in the movement log and then
//! published on an [`EventBus`] so downstream readers (reporting caches,
//! notification senders) can react without polling.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
