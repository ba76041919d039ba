//! The three ordered gates checked before any broker-mutating step: the
//! internal circuit-breaker/RECOVERY flag, the per-symbol lock (enforced
//! structurally by [`crate::lock_map::SymbolLockMap`], not a boolean
//! here), and reconcile-freshness (whether a startup sync has run at
//! least once).
//!
//! A refusal never panics or no-ops silently — it is reported as a
//! [`tcx_core::SequenceResult`] with `success = false` and a
//! `GateRefused` conflict entry (see [`crate::sequencer`]).

use std::sync::atomic::{AtomicBool, Ordering};

use tcx_risk::CircuitBreakerRegistry;

/// Outcome of a single gate check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateCheck {
    Allowed,
    Refused(&'static str),
}

impl GateCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateCheck::Allowed)
    }
}

/// Integrity-armed gate: refused while any circuit breaker is OPEN,
/// matching §7's RECOVERY-mode definition (the internal analogue of the
/// teacher's `IntegrityState::is_execution_blocked`).
pub fn check_integrity_gate(breaker: &CircuitBreakerRegistry, now_ms: i64) -> GateCheck {
    if breaker.any_open(now_ms) {
        GateCheck::Refused("integrity_armed")
    } else {
        GateCheck::Allowed
    }
}

/// Tracks whether the startup broker/position sync (§4.4.4) has completed
/// at least once. Sequences refuse until it has — a freshly booted daemon
/// must not mutate broker state against possibly-stale local bookkeeping.
#[derive(Debug, Default)]
pub struct ReconcileFreshness {
    synced: AtomicBool,
}

impl ReconcileFreshness {
    pub fn new() -> Self {
        Self { synced: AtomicBool::new(false) }
    }

    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

pub fn check_reconcile_gate(freshness: &ReconcileFreshness) -> GateCheck {
    if freshness.is_synced() {
        GateCheck::Allowed
    } else {
        GateCheck::Refused("reconcile_clean")
    }
}
