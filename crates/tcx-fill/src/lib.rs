//! tcx-fill — Fill Detection Engine (C3).
//!
//! Given a submitted order id, returns a definitive [`tcx_core::FillResult`]
//! within a timeout. The overriding correctness property (§4.3, P6) is that
//! this engine must never report "not filled" when the broker has actually
//! filled the order — every path below is written to err toward re-checking
//! rather than toward a quick negative answer.

pub mod cancel_race;
pub mod clock;
pub mod error_classification;
pub mod monitor;
pub mod verification;

pub use clock::{InstantSleeper, Sleeper, TokioSleeper};
pub use error_classification::ErrorClass;
pub use monitor::{FillMonitor, FillOutcome, MonitorConfig};
pub use verification::bulletproof_check;
