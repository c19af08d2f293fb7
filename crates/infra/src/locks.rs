//! Per-position exclusive locks.
//!
//! A movement holds the locks of every position it touches from version
//! check to commit. Keys are always taken in sorted order so two movements
//! over overlapping positions cannot deadlock; a lock that is not granted
//! within the configured timeout fails the attempt with `LockTimeout`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use lotledger_inventory::{InventoryError, PositionKey};

type Handle = (PositionKey, Arc<Mutex<()>>);

#[derive(Debug)]
pub struct PositionLocks {
    table: Mutex<HashMap<PositionKey, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl PositionLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn handle(&self, key: PositionKey) -> Arc<Mutex<()>> {
        self.table.lock().entry(key).or_default().clone()
    }

    /// Run `f` while holding the locks of `keys`.
    ///
    /// Locks are released when `f` returns, or as soon as one of them times
    /// out (in which case `f` never runs).
    pub fn with_locked<R>(&self, keys: &[PositionKey], f: impl FnOnce() -> R) -> Result<R, InventoryError> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let handles: Vec<Handle> = keys.into_iter().map(|key| (key, self.handle(key))).collect();
        hold(&handles, self.timeout, f)
    }
}

fn hold<R>(handles: &[Handle], timeout: Duration, f: impl FnOnce() -> R) -> Result<R, InventoryError> {
    let Some(((key, mutex), rest)) = handles.split_first() else {
        return Ok(f());
    };

    let _guard = mutex.try_lock_for(timeout).ok_or(InventoryError::LockTimeout {
        depot_id: key.depot_id,
        article_id: key.article_id,
        waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })?;
    hold(rest, timeout, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotledger_core::{ArticleId, DepotId};
    use std::sync::mpsc;
    use std::thread;

    fn key() -> PositionKey {
        PositionKey::new(DepotId::new(), ArticleId::new())
    }

    #[test]
    fn runs_closure_under_locks() {
        let locks = PositionLocks::new(Duration::from_millis(50));
        let a = key();
        let out = locks.with_locked(&[a, key(), a], || 7).unwrap();
        assert_eq!(out, 7);
        // Released afterwards.
        assert!(locks.with_locked(&[a], || ()).is_ok());
    }

    #[test]
    fn times_out_while_another_holder_keeps_the_key() {
        let locks = Arc::new(PositionLocks::new(Duration::from_millis(20)));
        let shared = key();
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let locks = locks.clone();
            thread::spawn(move || {
                locks
                    .with_locked(&[shared], || {
                        held_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                    })
                    .unwrap();
            })
        };

        held_rx.recv().unwrap();
        let err = locks.with_locked(&[key(), shared], || ()).unwrap_err();
        assert_eq!(err.code(), "lock_timeout");
        assert!(err.is_retryable());

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(locks.with_locked(&[shared], || ()).is_ok());
    }
}
