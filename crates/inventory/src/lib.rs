//! Lot-based inventory domain (pure, deterministic).
//!
//! Lots, stock positions, movements and the planner that turns a movement
//! into ledger effects. No IO, no locking, no storage: the infrastructure
//! layer commits plans produced here.

pub mod allocation;
pub mod error;
pub mod events;
pub mod lot;
pub mod movement;
pub mod planner;
pub mod position;
pub mod quantity;

pub use allocation::{AllocationResult, AllocationStrategy, ExplicitLots, Fifo, LotSource};
pub use error::{InventoryError, InventoryResult, MovementRejection};
pub use events::{LedgerEffect, MovementApplied};
pub use lot::{Lot, NewLot};
pub use movement::{
    AdjustmentDelta, EntryLine, ExitLine, LotAllocation, LotSelection, Movement, MovementKind, MovementStatus,
    MovementType, TransferLine,
};
pub use planner::{LedgerView, MovementPlan, MovementPlanner};
pub use position::{PositionKey, ReleaseSplit, StockPosition};
pub use quantity::{QUANTITY_TOLERANCE_KG, Quantity, checked_total, within_tolerance};
