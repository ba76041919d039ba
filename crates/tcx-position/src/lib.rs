//! tcx-position — Position State Tracker (C1).
//!
//! Per-symbol ground truth: entry, quantity, stop, R-multiple, protection
//! state. All operations here are synchronous and intended to complete in
//! microseconds — no broker I/O lives in this crate. Every other core crate
//! (`tcx-sequencer`, `tcx-fill`, `tcx-protection`, `tcx-strategy`) reads and
//! mutates open positions only through the narrow [`PositionTracker`] API.

pub mod transitions;
pub mod tracker;

pub use tracker::{PositionTracker, TrackError};
pub use transitions::{next_protection_state, r_multiple_milli};
