//! Core data model — position, protection state, order sequencing results.
//!
//! Money and price fields are `i64` integer micros throughout (see
//! [`crate::prices`]); `f64` only appears where it is a direct
//! deserialization of a broker wire value or a ratio/percentage output
//! (R-multiple, confidence).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Long or short.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Ordered protection-state lifecycle (§4.1, §4.1.1). Transitions are
/// monotonic: the discriminant index only ever increases (P3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectionState {
    InitialRisk,
    BreakevenProtected,
    PartialProfitTaken,
    AdvancedProfitTaken,
    FinalProfitTaken,
}

impl ProtectionState {
    /// Ordinal index used to enforce monotonicity (P3).
    pub fn index(self) -> u8 {
        match self {
            ProtectionState::InitialRisk => 0,
            ProtectionState::BreakevenProtected => 1,
            ProtectionState::PartialProfitTaken => 2,
            ProtectionState::AdvancedProfitTaken => 3,
            ProtectionState::FinalProfitTaken => 4,
        }
    }
}

/// A completed partial profit-taking exit (§3 PartialExit). Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialExit {
    pub shares_sold: i64,
    pub exit_price_micros: i64,
    pub profit_amount_micros: i64,
    /// R-multiple at the moment this exit fired, in milli-R (r * 1000) for
    /// exact comparisons; display code divides by 1000.0.
    pub r_multiple_at_exit_milli: i64,
    pub timestamp: DateTime<Utc>,
}

/// Tracks share allocation across partial exits (§3 ShareAllocation).
///
/// Invariant: `remaining_quantity == original_quantity - sum(partial_exits.shares_sold)`
/// and `remaining_quantity >= 0` at all times (P5).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareAllocation {
    pub original_quantity: i64,
    pub remaining_quantity: i64,
    pub partial_exits: Vec<PartialExit>,
}

impl ShareAllocation {
    pub fn new(original_quantity: i64) -> Self {
        Self {
            original_quantity,
            remaining_quantity: original_quantity,
            partial_exits: Vec::new(),
        }
    }

    pub fn total_shares_sold(&self) -> i64 {
        self.partial_exits.iter().map(|p| p.shares_sold).sum()
    }

    /// Record a partial exit. Caller must have already validated
    /// `0 < shares_sold <= remaining_quantity`.
    pub fn record_exit(&mut self, exit: PartialExit) {
        debug_assert!(exit.shares_sold > 0);
        debug_assert!(exit.shares_sold <= self.remaining_quantity);
        self.remaining_quantity -= exit.shares_sold;
        self.partial_exits.push(exit);
    }
}

/// Per-symbol ground truth tracked by C1 (§3 Position).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price_micros: i64,
    /// Fixed at creation; never mutated.
    pub original_quantity: i64,
    /// Current remaining shares (mirrors `share_allocation.remaining_quantity`).
    pub quantity: i64,
    pub stop_loss_micros: i64,
    /// The stop price at `track()` time. Fixed at entry — GLOSSARY "initial
    /// risk" does not change even as `stop_loss_micros` trails, and R must
    /// keep being measured against it (otherwise R collapses to 0 the
    /// moment the trailing stop reaches breakeven).
    pub initial_stop_loss_micros: i64,
    pub take_profit_micros: Option<i64>,
    pub current_price_micros: i64,
    /// Unrealized P/L in micros at `current_price_micros`.
    pub unrealized_pl_micros: i64,
    /// Unrealized P/L percent (float; not a money quantity).
    pub unrealized_pl_pct: f64,
    /// R-multiple, stored as milli-R (r * 1000) for exact comparisons in
    /// state-transition predicates; `r_multiple()` exposes the float form.
    pub r_multiple_milli: i64,
    pub protection_state: ProtectionState,
    pub trailing_active: bool,
    pub last_stop_update: Option<DateTime<Utc>>,
    pub share_allocation: ShareAllocation,
    pub entry_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// Float R-multiple for display/logging/testable-property comparisons.
    pub fn r_multiple(&self) -> f64 {
        self.r_multiple_milli as f64 / 1000.0
    }

    pub fn is_profitable(&self) -> bool {
        self.unrealized_pl_micros > 0
    }

    /// Initial risk in micros: `|entry - initial_stop|`, fixed at `track()`
    /// time (GLOSSARY "Initial risk"). The trailing-stop table (§4.4.1) is
    /// expressed in multiples of this value.
    pub fn initial_risk_micros(&self) -> i64 {
        match self.side {
            Side::Long => self.entry_price_micros - self.initial_stop_loss_micros,
            Side::Short => self.initial_stop_loss_micros - self.entry_price_micros,
        }
    }
}

/// Broker-observed order status, normalized to the lower-cased set in §3.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Held,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Accepted | OrderStatus::Held)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    TrailingStop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    Day,
    Gtc,
}

/// A bracket child order (stop-loss or take-profit leg).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BracketLeg {
    pub order_type: OrderType,
    pub stop_price_micros: Option<i64>,
    pub limit_price_micros: Option<i64>,
}

/// Request to submit an order to the broker (§6).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub qty: i64,
    pub side: Side,
    /// Market-order direction: buy opens/adds to a long, sell closes/shorts.
    pub is_buy: bool,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub limit_price_micros: Option<i64>,
    pub stop_price_micros: Option<i64>,
    pub bracket_legs: Vec<BracketLeg>,
}

/// Broker order view (§3 Order).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub status: OrderStatus,
    pub side: Side,
    pub is_buy: bool,
    pub qty: i64,
    pub filled_qty: i64,
    pub filled_avg_price_micros: Option<i64>,
    pub filled_at: Option<DateTime<Utc>>,
    pub order_type: OrderType,
    /// Resting stop price for a `Stop`/`TrailingStop` order, as last
    /// reported by the broker (not the fill price).
    pub stop_price_micros: Option<i64>,
    /// Resting limit price for a `Limit` order.
    pub limit_price_micros: Option<i64>,
    pub legs: Vec<Order>,
}

/// Detection method that confirmed a fill (§4.3.2, §4.3.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionMethod {
    StatusField,
    QuantityMatch,
    FillPrice,
    TimestampCheck,
    FinalVerification,
    CancelRaceDetection,
    UltimateSafetyNet,
}

/// Terminal outcome of fill monitoring (§3 FillResult, generalized beyond a
/// single `filled: bool` flag so TIMEOUT/ERROR are distinguishable without a
/// sentinel).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillStatus {
    Filled,
    Partial,
    Rejected,
    Timeout,
    Error,
}

/// Full result of a fill-monitoring run (§3 FillResult).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub filled: bool,
    pub status: FillStatus,
    pub fill_price_micros: Option<i64>,
    pub fill_quantity: i64,
    pub fill_timestamp: Option<DateTime<Utc>>,
    pub detection_method: Option<DetectionMethod>,
    pub checks_performed: Vec<DetectionMethod>,
    pub elapsed_ms: i64,
    pub api_calls_made: u32,
    pub retries_attempted: u32,
    pub status_history: Vec<OrderStatus>,
    pub last_known_status: Option<OrderStatus>,
}

impl FillResult {
    pub fn error(message: impl Into<String>) -> (Self, String) {
        (
            Self {
                filled: false,
                status: FillStatus::Error,
                fill_price_micros: None,
                fill_quantity: 0,
                fill_timestamp: None,
                detection_method: None,
                checks_performed: Vec::new(),
                elapsed_ms: 0,
                api_calls_made: 0,
                retries_attempted: 0,
                status_history: Vec::new(),
                last_known_status: None,
            },
            message.into(),
        )
    }
}

/// One of the order-conflict categories C2 can detect (§4.2).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderConflict {
    ConcurrentModification,
    DuplicateOrder,
    InsufficientShares,
    SharesLocked,
    InvalidPrice,
    BrokerRejection,
    /// Raised when a gate (§4.2, [ADDED]) refuses the sequence before any
    /// broker call is attempted.
    GateRefused { gate: String },
}

/// Result of one C2 atomic sequence (§3 SequenceResult).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub success: bool,
    pub sequence_id: String,
    pub operations_completed: Vec<String>,
    pub conflicts_detected: Vec<OrderConflict>,
    pub rollback_performed: bool,
    pub execution_time_ms: i64,
    pub message: String,
}

impl SequenceResult {
    pub fn refused(sequence_id: impl Into<String>, gate: impl Into<String>) -> Self {
        Self {
            success: false,
            sequence_id: sequence_id.into(),
            operations_completed: Vec::new(),
            conflicts_detected: vec![OrderConflict::GateRefused { gate: gate.into() }],
            rollback_performed: false,
            execution_time_ms: 0,
            message: "sequence refused by gate".to_string(),
        }
    }
}

/// Availability summary from `verify_shares_available` (§4.2).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareAvailability {
    pub available: i64,
    pub locked: i64,
    pub is_available: bool,
}
