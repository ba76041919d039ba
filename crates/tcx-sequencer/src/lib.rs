//! tcx-sequencer — Order Sequencer (C2).
//!
//! Every broker-side order mutation executes as an atomic sequence per
//! symbol: cancel existing stop, submit new stop, submit partial exit,
//! cancel all exit orders. A sequence holds the symbol's lock for its full
//! duration, checks the integrity/reconcile gates before touching the
//! broker, and rolls back for real (not just a log line) when a step fails
//! partway through.

pub mod backoff;
pub mod conflicts;
pub mod gates;
pub mod lock_map;
pub mod sequencer;

pub use conflicts::{detect_conflicts, verify_shares_available, SequenceOp};
pub use gates::{check_integrity_gate, check_reconcile_gate, GateCheck, ReconcileFreshness};
pub use lock_map::SymbolLockMap;
pub use sequencer::{EntryOutcome, OrderSequencer, PartialExitOutcome, SequencerConfig};
