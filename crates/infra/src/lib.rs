//! Infrastructure layer: stores, locking, rate cache, processing and reporting.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod fx_cache;
pub mod locks;
pub mod lot_ledger;
pub mod movement_log;
pub mod position_store;
pub mod processor;
pub mod replay;


pub use aggregator::{
    ArticleRollup, DepotSummary, GlobalRollup, PositionFilter, PositionValuation, PositionView, StockAggregator,
};
pub use config::EngineConfig;
pub use engine::{InventoryEngine, LedgerBus};
pub use fx_cache::{RateCache, RateSource};
pub use locks::PositionLocks;
pub use lot_ledger::{InMemoryLotLedger, LotLedger};
pub use movement_log::{InMemoryMovementLog, MovementLog, MovementLogError, StoredMovement};
pub use position_store::{InMemoryPositionStore, PositionStore};
pub use processor::{MovementProcessor, MovementReceipt, PositionAdjustment};
pub use replay::{ReplayError, ReplayReport, replay, replay_into};
