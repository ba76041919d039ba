//! tcx-strategy — Strategy & Entry Pipeline (C5).
//!
//! On each feature tick for a candidate symbol, decides whether to enter
//! and, if so, submits a slippage-adjusted bracket order through C2. Never
//! manages an already-open position — that is C4 (`tcx-protection`).

pub mod cooldown;
pub mod filters;
pub mod pipeline;
pub mod shadow;
pub mod signal;
pub mod sizing;
pub mod test_doubles;
pub mod threshold;

pub use cooldown::CooldownTracker;
pub use filters::{evaluate_filters, trading_session, FilterContext, Rejection, Session};
pub use pipeline::{EvaluationOutcome, PipelineConfig, StrategyPipeline};
pub use shadow::{blend, spawn_shadow_observation, NullObserver, NullSink, ShadowObserver, ShadowSink, SHADOW_WEIGHT};
pub use signal::{build_signal, Direction, Signal};
pub use sizing::{size_entry, SizedEntry, SizingConfig};
pub use threshold::{adaptive_threshold, ThresholdConfig};
