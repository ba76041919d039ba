//! Per-symbol mutual exclusion (§4.2: "holds a per-symbol mutex for the
//! duration of a sequence"). Modeled on this workspace's sharded-lock
//! pattern (`tcx-position`'s `RwLock<HashMap<Symbol, Mutex<Position>>>`):
//! an outer `std::sync::Mutex` only ever guards entry creation in the map,
//! never the symbol's critical section itself, so a sequence in flight for
//! `AAPL` never blocks a concurrent sequence starting for `MSFT`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Holds the per-symbol `tokio::sync::Mutex` for the lifetime of a
/// sequence. Dropping this releases the lock, letting the next queued
/// sequence for the same symbol proceed (§4.2.1: `CONCURRENT_MODIFICATION`
/// "wait on the symbol lock, no retry storm").
pub struct SymbolGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of per-symbol locks, shared behind an `Arc` by the sequencer
/// and anything that needs to observe whether a symbol is currently mid-
/// sequence.
#[derive(Default)]
pub struct SymbolLockMap {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SymbolLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("symbol lock map poisoned");
        locks.entry(symbol.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquire the symbol's lock, waiting if another sequence currently
    /// holds it. Never fails; the only way to "refuse" a busy symbol is to
    /// not call this (callers needing a non-blocking check should use
    /// [`SymbolLockMap::is_locked`] first).
    pub async fn acquire(&self, symbol: &str) -> SymbolGuard {
        let lock = self.lock_for(symbol);
        let guard = lock.lock_owned().await;
        SymbolGuard { _guard: guard }
    }

    /// Non-blocking probe: `true` if a sequence currently holds this
    /// symbol's lock. Used by `detect_conflicts` to report
    /// `CONCURRENT_MODIFICATION` without actually blocking on it.
    pub fn is_locked(&self, symbol: &str) -> bool {
        let lock = self.lock_for(symbol);
        lock.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distinct_symbols_do_not_block_each_other() {
        let map = SymbolLockMap::new();
        let _aapl = map.acquire("AAPL").await;
        // MSFT must be free even though AAPL is held.
        assert!(!map.is_locked("MSFT"));
        assert!(map.is_locked("AAPL"));
    }

    #[tokio::test]
    async fn guard_drop_releases_lock() {
        let map = SymbolLockMap::new();
        {
            let _guard = map.acquire("TSLA").await;
            assert!(map.is_locked("TSLA"));
        }
        assert!(!map.is_locked("TSLA"));
    }

    #[tokio::test]
    async fn second_acquire_waits_for_first_to_drop() {
        let map = Arc::new(SymbolLockMap::new());
        let guard = map.acquire("AAPL").await;
        let map2 = map.clone();
        let handle = tokio::spawn(async move {
            let _g = map2.acquire("AAPL").await;
        });
        tokio::task::yield_now().await;
        assert!(map.is_locked("AAPL"));
        drop(guard);
        handle.await.unwrap();
    }
}
