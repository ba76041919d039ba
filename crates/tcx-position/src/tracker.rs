//! [`PositionTracker`] — the in-memory map of open positions keyed by
//! symbol (§4.1).
//!
//! Concurrency model (§4.1 [ADDED], §5, §9 "per-symbol lock map"): an outer
//! `RwLock<HashMap<Symbol, Mutex<Position>>>` so a write to one symbol never
//! blocks a read of another. `get_all` clones each position under its own
//! short-lived per-symbol lock, never the whole map, so no torn Position is
//! ever observed even though the snapshot as a whole is not atomic across
//! symbols (§5 "across symbols: no ordering").

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::Utc;

use tcx_core::{PartialExit, Position, ProtectionState, ShareAllocation, Side};

use crate::transitions::{next_protection_state, r_multiple_milli};

/// Errors from C1 operations. None of these are broker/network errors —
/// they are all local invariant checks (§7 "State" error taxonomy: fail the
/// operation, log critically, never corrupt state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    AlreadyTracked,
    NotFound,
    StopMonotonicityViolation,
    InvalidPartialExit,
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackError::AlreadyTracked => write!(f, "position already tracked for symbol"),
            TrackError::NotFound => write!(f, "no position tracked for symbol"),
            TrackError::StopMonotonicityViolation => {
                write!(f, "stop update would violate monotonicity (P1)")
            }
            TrackError::InvalidPartialExit => {
                write!(f, "partial exit exceeds remaining quantity or is non-positive")
            }
        }
    }
}

impl std::error::Error for TrackError {}

pub struct PositionTracker {
    positions: RwLock<HashMap<String, Mutex<Position>>>,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTracker {
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// §4.1 `track`. Fails with [`TrackError::AlreadyTracked`] if a
    /// Position already exists for the symbol — callers (C3, on confirmed
    /// fill) must `remove` first on a full re-entry after a flatten.
    pub fn track(
        &self,
        symbol: &str,
        entry_price_micros: i64,
        stop_loss_micros: i64,
        quantity: i64,
        side: Side,
    ) -> Result<Position, TrackError> {
        let mut map = self.positions.write().expect("position map lock poisoned");
        if map.contains_key(symbol) {
            return Err(TrackError::AlreadyTracked);
        }
        let now = Utc::now();
        let position = Position {
            symbol: symbol.to_string(),
            side,
            entry_price_micros,
            original_quantity: quantity,
            quantity,
            stop_loss_micros,
            initial_stop_loss_micros: stop_loss_micros,
            take_profit_micros: None,
            current_price_micros: entry_price_micros,
            unrealized_pl_micros: 0,
            unrealized_pl_pct: 0.0,
            r_multiple_milli: 0,
            protection_state: ProtectionState::InitialRisk,
            trailing_active: false,
            last_stop_update: None,
            share_allocation: ShareAllocation::new(quantity),
            entry_time: now,
            last_updated: now,
        };
        map.insert(symbol.to_string(), Mutex::new(position.clone()));
        tracing::info!(symbol, entry_price_micros, stop_loss_micros, quantity, side = %side, "position tracked");
        Ok(position)
    }

    /// §4.1 `update_price`. Recomputes P/L and R-multiple, then advances
    /// `ProtectionState` per §4.1.1 if warranted (P3: strictly forward
    /// only). Returns `None` if the symbol is not tracked — this is not an
    /// error, a late price tick for a symbol that has since been fully
    /// exited is expected and must be a silent no-op (§5 "a concurrent
    /// late-arriving price update that would not advance the state must be
    /// a no-op").
    pub fn update_price(&self, symbol: &str, price_micros: i64) -> Option<Position> {
        let map = self.positions.read().expect("position map lock poisoned");
        let slot = map.get(symbol)?;
        let mut position = slot.lock().expect("position lock poisoned");

        position.current_price_micros = price_micros;
        let pl = match position.side {
            Side::Long => (price_micros - position.entry_price_micros) * position.quantity,
            Side::Short => (position.entry_price_micros - price_micros) * position.quantity,
        };
        position.unrealized_pl_micros = pl;
        position.unrealized_pl_pct = if position.entry_price_micros != 0 {
            match position.side {
                Side::Long => {
                    (price_micros - position.entry_price_micros) as f64
                        / position.entry_price_micros as f64
                        * 100.0
                }
                Side::Short => {
                    (position.entry_price_micros - price_micros) as f64
                        / position.entry_price_micros as f64
                        * 100.0
                }
            }
        } else {
            0.0
        };

        // R is measured against the *initial* stop (GLOSSARY "Initial
        // risk"), never the live trailing stop — otherwise R would collapse
        // to 0 the instant the stop reaches breakeven.
        position.r_multiple_milli = r_multiple_milli(
            position.side,
            position.entry_price_micros,
            position.initial_stop_loss_micros,
            price_micros,
        );

        let next = next_protection_state(
            position.protection_state,
            position.r_multiple_milli,
            position.share_allocation.partial_exits.len(),
            position.share_allocation.remaining_quantity,
        );
        if next.index() > position.protection_state.index() {
            tracing::info!(
                symbol,
                from = ?position.protection_state,
                to = ?next,
                r_multiple = position.r_multiple(),
                "protection state advanced"
            );
            position.protection_state = next;
        }

        position.last_updated = Utc::now();
        Some(position.clone())
    }

    /// §4.1 `update_stop_loss`. Rejects any update that would violate P1
    /// stop monotonicity (long: never decreases; short: never increases).
    pub fn update_stop_loss(&self, symbol: &str, new_stop_micros: i64) -> Result<bool, TrackError> {
        let map = self.positions.read().expect("position map lock poisoned");
        let slot = map.get(symbol).ok_or(TrackError::NotFound)?;
        let mut position = slot.lock().expect("position lock poisoned");

        let violates = match position.side {
            Side::Long => new_stop_micros < position.stop_loss_micros,
            Side::Short => new_stop_micros > position.stop_loss_micros,
        };
        if violates {
            tracing::warn!(
                symbol,
                current_stop = position.stop_loss_micros,
                attempted_stop = new_stop_micros,
                "stop update rejected: would violate monotonicity"
            );
            return Ok(false);
        }

        position.stop_loss_micros = new_stop_micros;
        position.last_stop_update = Some(Utc::now());
        position.last_updated = Utc::now();
        Ok(true)
    }

    /// §4.1 `record_partial_exit`. Decrements `remaining_quantity`, appends
    /// a [`PartialExit`], and mirrors `quantity` (P5: sum of shares_sold
    /// never exceeds `original_quantity`).
    pub fn record_partial_exit(
        &self,
        symbol: &str,
        shares_sold: i64,
        price_micros: i64,
        profit_micros: i64,
    ) -> Result<bool, TrackError> {
        let map = self.positions.read().expect("position map lock poisoned");
        let slot = map.get(symbol).ok_or(TrackError::NotFound)?;
        let mut position = slot.lock().expect("position lock poisoned");

        if shares_sold <= 0 || shares_sold > position.share_allocation.remaining_quantity {
            return Ok(false);
        }

        let exit = PartialExit {
            shares_sold,
            exit_price_micros: price_micros,
            profit_amount_micros: profit_micros,
            r_multiple_at_exit_milli: position.r_multiple_milli,
            timestamp: Utc::now(),
        };
        position.share_allocation.record_exit(exit);
        position.quantity = position.share_allocation.remaining_quantity;
        position.last_updated = Utc::now();

        tracing::info!(
            symbol,
            shares_sold,
            remaining = position.share_allocation.remaining_quantity,
            "partial exit recorded"
        );
        Ok(true)
    }

    /// Destroys tracking for a symbol (full exit or explicit flatten).
    pub fn remove(&self, symbol: &str) -> Option<Position> {
        let mut map = self.positions.write().expect("position map lock poisoned");
        map.remove(symbol).map(|m| m.into_inner().expect("position lock poisoned"))
    }

    pub fn get(&self, symbol: &str) -> Option<Position> {
        let map = self.positions.read().expect("position map lock poisoned");
        map.get(symbol)
            .map(|slot| slot.lock().expect("position lock poisoned").clone())
    }

    /// Point-in-time snapshot of every tracked position. Each Position is
    /// cloned under its own short-lived lock; the snapshot as a whole is
    /// not atomic across symbols (§5).
    pub fn get_all(&self) -> Vec<Position> {
        let map = self.positions.read().expect("position map lock poisoned");
        map.values()
            .map(|slot| slot.lock().expect("position lock poisoned").clone())
            .collect()
    }

    pub fn symbols(&self) -> Vec<String> {
        let map = self.positions.read().expect("position map lock poisoned");
        map.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn tracker() -> PositionTracker {
        PositionTracker::new()
    }

    #[test]
    fn track_then_duplicate_fails() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        let err = t.track("AAPL", 101_000_000, 99_000_000, 50, Side::Long).unwrap_err();
        assert_eq!(err, TrackError::AlreadyTracked);
    }

    #[test]
    fn update_price_unknown_symbol_is_none() {
        let t = tracker();
        assert!(t.update_price("MSFT", 1).is_none());
    }

    // Scenario 1 (§8): AAPL trailing-stop ladder R-multiple progression.
    #[test]
    fn trailing_stop_ladder_r_multiples() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();

        let cases = [
            (100_500_000, 250),
            (102_000_000, 1_000),
            (103_500_000, 1_750),
            (104_500_000, 2_250),
            (106_500_000, 3_250),
            (108_500_000, 4_250),
        ];
        for (price, expected_r_milli) in cases {
            let p = t.update_price("AAPL", price).unwrap();
            assert_eq!(p.r_multiple_milli, expected_r_milli, "price {price}");
        }
    }

    // Scenario 1 (§8), full ladder: R must stay correct even as the stop is
    // trailed up behind it — it is measured against the *initial* stop, not
    // the live one, otherwise R would collapse to 0 once the stop reaches
    // breakeven.
    #[test]
    fn trailing_stop_ladder_r_multiples_survive_stop_advancement() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();

        let cases = [
            (100_500_000, 250, 98_000_000),
            (102_000_000, 1_000, 100_000_000),
            (103_500_000, 1_750, 101_000_000),
            (104_500_000, 2_250, 102_000_000),
            (106_500_000, 3_250, 103_000_000),
            (108_500_000, 4_250, 104_000_000),
        ];
        for (price, expected_r_milli, trail_to) in cases {
            let p = t.update_price("AAPL", price).unwrap();
            assert_eq!(p.r_multiple_milli, expected_r_milli, "price {price}");
            assert!(t.update_stop_loss("AAPL", trail_to).unwrap());
        }
        assert_eq!(t.get("AAPL").unwrap().initial_stop_loss_micros, 98_000_000);
    }

    #[test]
    fn stop_monotonicity_rejects_regression_long() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        assert!(t.update_stop_loss("AAPL", 99_000_000).unwrap());
        // Attempting to move it back down is rejected (P1).
        assert!(!t.update_stop_loss("AAPL", 98_500_000).unwrap());
        assert_eq!(t.get("AAPL").unwrap().stop_loss_micros, 99_000_000);
    }

    #[test]
    fn stop_monotonicity_rejects_regression_short() {
        let t = tracker();
        t.track("TSLA", 100_000_000, 102_000_000, 100, Side::Short).unwrap();
        assert!(t.update_stop_loss("TSLA", 101_000_000).unwrap());
        assert!(!t.update_stop_loss("TSLA", 101_500_000).unwrap());
    }

    // Scenario 2 (§8): partial exit accounting sums to original_quantity.
    #[test]
    fn partial_exit_accounting_p5() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        assert!(t.record_partial_exit("AAPL", 50, 102_000_000, 100_000_000).unwrap());
        assert!(t.record_partial_exit("AAPL", 25, 104_000_000, 50_000_000).unwrap());
        assert!(t.record_partial_exit("AAPL", 25, 106_000_000, 50_000_000).unwrap());
        let p = t.get("AAPL").unwrap();
        assert_eq!(p.share_allocation.remaining_quantity, 0);
        assert_eq!(p.share_allocation.total_shares_sold(), 100);
        // Over-selling is rejected.
        assert!(!t.record_partial_exit("AAPL", 1, 106_000_000, 0).unwrap());
    }

    #[test]
    fn record_partial_exit_rejects_nonpositive_and_oversell() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        assert!(!t.record_partial_exit("AAPL", 0, 102_000_000, 0).unwrap());
        assert!(!t.record_partial_exit("AAPL", -5, 102_000_000, 0).unwrap());
        assert!(!t.record_partial_exit("AAPL", 200, 102_000_000, 0).unwrap());
    }

    #[test]
    fn protection_state_only_advances_p3() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        t.update_price("AAPL", 102_000_000).unwrap(); // R=1.0 -> breakeven
        assert_eq!(t.get("AAPL").unwrap().protection_state, ProtectionState::BreakevenProtected);
        // A subsequent lower price must not regress the state.
        t.update_price("AAPL", 100_500_000).unwrap();
        assert_eq!(t.get("AAPL").unwrap().protection_state, ProtectionState::BreakevenProtected);
    }

    #[test]
    fn breakeven_protection_p2() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        t.update_price("AAPL", 102_000_000).unwrap();
        // §4.4's trailing-stop table is C4's job; C1 only guarantees the
        // stop can never fall below entry once moved there.
        assert!(t.update_stop_loss("AAPL", 100_000_000).unwrap());
        t.update_price("AAPL", 99_000_000).unwrap();
        assert!(t.get("AAPL").unwrap().stop_loss_micros >= 100_000_000);
    }

    // P9-flavored: concurrent update_price calls to *different* symbols
    // never block each other or corrupt state.
    #[test]
    fn concurrent_updates_to_different_symbols_do_not_interact() {
        let t = Arc::new(tracker());
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        t.track("MSFT", 200_000_000, 196_000_000, 50, Side::Long).unwrap();

        let t1 = Arc::clone(&t);
        let h1 = thread::spawn(move || {
            for i in 0..200 {
                t1.update_price("AAPL", 100_000_000 + i * 1_000).unwrap();
            }
        });
        let t2 = Arc::clone(&t);
        let h2 = thread::spawn(move || {
            for i in 0..200 {
                t2.update_price("MSFT", 200_000_000 + i * 1_000).unwrap();
            }
        });
        h1.join().unwrap();
        h2.join().unwrap();

        assert_eq!(t.get("AAPL").unwrap().current_price_micros, 100_199_000);
        assert_eq!(t.get("MSFT").unwrap().current_price_micros, 200_199_000);
    }

    #[test]
    fn get_all_returns_every_tracked_symbol() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        t.track("MSFT", 200_000_000, 196_000_000, 50, Side::Long).unwrap();
        let all = t.get_all();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn remove_destroys_tracking() {
        let t = tracker();
        t.track("AAPL", 100_000_000, 98_000_000, 100, Side::Long).unwrap();
        assert!(t.remove("AAPL").is_some());
        assert!(t.get("AAPL").is_none());
    }
}
