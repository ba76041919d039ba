//! Reconciliation between the broker's reported state and this process's
//! local view (§4.4 "Reconcile").
//!
//! Architectural decisions:
//! - Broker snapshot reconciliation required before LIVE
//! - Divergence triggers HALT
//! - Unknown broker order triggers HALT
//! - Position mismatch triggers HALT
//! - Clean reconcile required before arming
//!
//! Deterministic, pure logic. No IO. No broker calls.

mod engine;
pub mod gate;
mod types;
mod watermark;

pub mod snapshot_adapter;

// `reconcile_monotonic` is the production path; it enforces snapshot
// monotonicity via `SnapshotWatermark` before running content comparison.
// `StaleBrokerSnapshot` is returned when a snapshot fails the watermark check.
pub use engine::{is_clean_reconcile, reconcile, reconcile_monotonic, StaleBrokerSnapshot};

pub use gate::{check_arm_gate, check_start_gate, reconcile_tick, ArmStartGate, DriftAction};
pub use snapshot_adapter::{
    normalize, normalize_json, normalize_lenient, RawBrokerOrder, RawBrokerPosition,
    RawBrokerSnapshot, SnapshotAdapterError,
};
pub use types::*;
pub use watermark::{SnapshotFreshness, SnapshotWatermark};
