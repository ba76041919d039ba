//! Account-level risk enforcement: daily loss limit, max drawdown, reject
//! storm protection, PDT auto mode, kill switch behavior, and a
//! per-operation circuit breaker for broker call failures.
//!
//! Deterministic, pure logic. No IO; every function takes its notion of
//! "now" as an explicit input rather than reading the wall clock.

mod engine;
mod types;

pub mod arm_state;
pub mod breaker;
pub mod pdt;

pub use arm_state::{ArmState, DisarmReason};
pub use breaker::{BreakerConfig, BreakerState, CircuitBreakerRegistry, OperationBreaker};
pub use engine::{evaluate, tick, validate_equity_input, validate_order_qty};
pub use pdt::{
    clear_pdt_flag, evaluate_pdt, record_day_trade, tick_pdt, to_pdt_context, PdtDecision,
    PdtInput, PdtPolicy, PdtReason, PdtState, PDT_DAY_TRADE_THRESHOLD, PDT_DEFAULT_WINDOW_DAYS,
    PDT_MIN_EQUITY_MICROS,
};
pub use types::*;
