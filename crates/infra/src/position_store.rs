//! Stock position storage, keyed by `(depot, article)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lotledger_core::AggregateRoot;
use lotledger_inventory::{PositionKey, StockPosition};

/// Key/value store for stock positions.
///
/// Writers are expected to hold the position locks for the keys they touch;
/// the store itself only guarantees that a batch becomes visible at once.
pub trait PositionStore: Send + Sync {
    fn get(&self, key: &PositionKey) -> Option<StockPosition>;

    /// Current version of a position; `0` if it was never written.
    fn version(&self, key: &PositionKey) -> u64 {
        self.get(key).map(|p| p.version()).unwrap_or(0)
    }

    fn upsert(&self, position: StockPosition);

    /// Write several positions under a single write lock.
    fn upsert_all(&self, positions: Vec<StockPosition>);

    fn list(&self) -> Vec<StockPosition>;

    /// Drop every position (rebuild support).
    fn clear(&self);
}

impl<S> PositionStore for Arc<S>
where
    S: PositionStore + ?Sized,
{
    fn get(&self, key: &PositionKey) -> Option<StockPosition> {
        (**self).get(key)
    }

    fn version(&self, key: &PositionKey) -> u64 {
        (**self).version(key)
    }

    fn upsert(&self, position: StockPosition) {
        (**self).upsert(position)
    }

    fn upsert_all(&self, positions: Vec<StockPosition>) {
        (**self).upsert_all(positions)
    }

    fn list(&self) -> Vec<StockPosition> {
        (**self).list()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory position store.
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    inner: RwLock<HashMap<PositionKey, StockPosition>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for InMemoryPositionStore {
    fn get(&self, key: &PositionKey) -> Option<StockPosition> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn upsert(&self, position: StockPosition) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(position.key(), position);
        }
    }

    fn upsert_all(&self, positions: Vec<StockPosition>) {
        if let Ok(mut map) = self.inner.write() {
            for position in positions {
                map.insert(position.key(), position);
            }
        }
    }

    fn list(&self) -> Vec<StockPosition> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        let mut positions: Vec<StockPosition> = map.values().cloned().collect();
        positions.sort_by_key(StockPosition::key);
        positions
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}
