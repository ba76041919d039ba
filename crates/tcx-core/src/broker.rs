//! Broker adapter trait and the generic error taxonomy adapters map into
//! (§6). Implementations live in `tcx-broker-paper` and `tcx-broker-alpaca`;
//! nothing in this crate talks to a real broker.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Order, OrderStatus, SubmitOrderRequest};

/// Account snapshot (§6 `get_account`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub equity_micros: i64,
    pub buying_power_micros: i64,
    pub cash_micros: i64,
    pub pattern_day_trader: bool,
}

/// Broker position snapshot (§6 `list_positions`/`get_position`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: i64,
    pub avg_entry_price_micros: i64,
    pub current_price_micros: i64,
    pub unrealized_pl_micros: i64,
}

/// One OHLCV bar (§6 `get_latest_bars`).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
}

/// Generic broker error taxonomy. Adapters MUST map broker-specific wire
/// errors into one of these variants; no broker-specific error type is
/// permitted to leak past the `BrokerAdapter` boundary (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    Rejected(String),
    NotFound(String),
    AlreadyTerminal,
    Timeout(u64),
    RateLimited { retry_after_ms: Option<u64> },
    Unauthorized,
    Connection(String),
    Protocol(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Rejected(msg) => write!(f, "broker rejected order: {msg}"),
            BrokerError::NotFound(id) => write!(f, "order not found: {id}"),
            BrokerError::AlreadyTerminal => {
                write!(f, "order already in a terminal state and cannot be canceled")
            }
            BrokerError::Timeout(ms) => write!(f, "broker request timed out after {ms}ms"),
            BrokerError::RateLimited { retry_after_ms } => {
                write!(f, "broker rate limit exceeded, retry after {retry_after_ms:?}ms")
            }
            BrokerError::Unauthorized => write!(f, "broker authentication failed"),
            BrokerError::Connection(msg) => write!(f, "broker connection error: {msg}"),
            BrokerError::Protocol(msg) => write!(f, "broker returned an unexpected response: {msg}"),
        }
    }
}

impl std::error::Error for BrokerError {}

impl BrokerError {
    /// The raw message text, for matching against the centralized
    /// "already filled" cancel-race indicator set in `tcx_fill::cancel_race`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// The broker-facing collaborator every component above C2 is built
/// against. Generalized from the teacher's single-broker assumption so
/// `tcx-broker-paper` and `tcx-broker-alpaca` are interchangeable in tests
/// and in the live/paper runtime modes (§5, §6).
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Server-side clock, used by the reconcile-freshness gate and by C3's
    /// timestamp-based fill check. Never the adapter's local wall clock.
    async fn get_clock(&self) -> Result<DateTime<Utc>, BrokerError>;

    async fn get_account(&self) -> Result<Account, BrokerError>;

    async fn list_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    async fn get_position(&self, symbol: &str) -> Result<Option<BrokerPosition>, BrokerError>;

    async fn list_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, BrokerError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError>;

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;

    async fn get_latest_bars(&self, symbol: &str, limit: u32) -> Result<Vec<Bar>, BrokerError>;

    async fn get_latest_trade_price(&self, symbol: &str) -> Result<i64, BrokerError>;
}

/// Convenience used by C3 to decide whether an order is done moving.
pub fn is_settled(status: OrderStatus) -> bool {
    status.is_terminal()
}
