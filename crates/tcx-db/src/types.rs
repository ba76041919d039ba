//! Row shapes for the persistence contract (§3 "Persisted state layout").
//! Every write is append-only except `upsert_position`, which is keyed by
//! symbol (§3: "single row per open position, upserted").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tcx_core::Side;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeEvent {
    Entry,
    PartialExit,
    FullExit,
}

/// One append-only trade record (§3 "trade record (entry/exit/partial)").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,
    pub event: TradeEvent,
    pub qty: i64,
    pub price_micros: i64,
    /// Populated for exit events; `None` for entries.
    pub r_multiple_milli: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// One append-only order record (§3 "order record"), keyed for
/// at-most-once ingestion by `client_order_id` (derived upstream via
/// `hash(symbol|side|qty|price_hint|timestamp_minute)`, §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderRecord {
    pub client_order_id: String,
    pub broker_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub filled_qty: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One append-only operator/system log line (§3 "log entry").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub symbol: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One append-only advisory (§3 "advisory entry") — a human-facing
/// notice distinct from a structured log line, e.g. a Discord-bound
/// notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdvisoryEntry {
    pub symbol: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Current position snapshot, upserted by symbol (§3 "position upsert by
/// symbol"). Mirrors the fields of `tcx_core::Position` that are worth
/// persisting for recovery/reporting; intentionally not the full struct so
/// the wire/storage shape can evolve independently of the in-memory one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionRecord {
    pub symbol: String,
    pub side: Side,
    pub entry_price_micros: i64,
    pub quantity: i64,
    pub stop_loss_micros: i64,
    pub current_price_micros: i64,
    pub unrealized_pl_micros: i64,
    pub protection_state: String,
    pub last_updated: DateTime<Utc>,
}

/// One periodic metrics snapshot (§3 "metrics snapshot").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tracked_positions: i64,
    pub total_unrealized_pl_micros: i64,
    pub positions_in_profit: i64,
    pub offline_queue_len: i64,
    pub timestamp: DateTime<Utc>,
}
