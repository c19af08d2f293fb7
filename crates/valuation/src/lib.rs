//! Valuation engine primitives (pure, deterministic).
//!
//! - weighted-average unit cost (CUMP) recurrence
//! - exchange-rate tables and multi-currency valuation of lots
//! - landed-cost calculator for decision support
//!
//! Nothing here holds state across calls; caching of rate tables lives with
//! the infrastructure that owns the provider.

pub mod cump;
pub mod error;
pub mod fx;
pub mod landed_cost;

pub use cump::{average_over, value_in, weighted_mean, ValuedQuantity};
pub use error::{ValuationError, ValuationResult};
pub use fx::{CurrencyRateProvider, RateTable, StaticRateProvider};
pub use landed_cost::{landed_cost, LandedCost, LandedCostInputs};
