//! Persistence contract for the trading engine (§3 "Persistence interface
//! (consumed)", §6 "Persistence trait").
//!
//! `PersistenceSink` carries exactly the operations the core crates need:
//! append-only writes for trades/orders/logs/advisories, a symbol-keyed
//! position upsert, a metrics snapshot, and one bootstrap read
//! (`get_trades`). The fuller run-lifecycle/outbox/inbox machinery this
//! workspace has used for backtesting is out of scope here — `tcx-runtime`
//! carries its own narrower in-process offline queue instead of a
//! DB-backed outbox (§5, §9).
//!
//! The persistence layer is expected to be eventually consistent: nothing
//! in the core crates reads back its own recent writes.

pub mod memory;
pub mod postgres;
pub mod types;

pub use memory::InMemoryPersistence;
pub use postgres::PostgresPersistence;
pub use types::{
    AdvisoryEntry, LogEntry, LogLevel, MetricsSnapshot, OrderRecord, PositionRecord, TradeEvent,
    TradeRecord,
};

use async_trait::async_trait;
use std::fmt;

pub const ENV_DB_URL: &str = "TCX_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    Connection(String),
    Write(String),
    Read(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Connection(msg) => write!(f, "persistence connection error: {msg}"),
            PersistenceError::Write(msg) => write!(f, "persistence write failed: {msg}"),
            PersistenceError::Read(msg) => write!(f, "persistence read failed: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Everything above C1-C5 that needs durable state writes through this
/// trait; no component talks to `sqlx` directly (§6).
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn insert_trade(&self, trade: TradeRecord) -> Result<(), PersistenceError>;

    async fn insert_order_record(&self, order: OrderRecord) -> Result<(), PersistenceError>;

    async fn insert_log_entry(&self, entry: LogEntry) -> Result<(), PersistenceError>;

    async fn insert_advisory(&self, advisory: AdvisoryEntry) -> Result<(), PersistenceError>;

    async fn upsert_position(&self, position: PositionRecord) -> Result<(), PersistenceError>;

    async fn insert_metrics_snapshot(&self, snapshot: MetricsSnapshot) -> Result<(), PersistenceError>;

    /// Bootstrap-only read: the most recent `limit` trades, newest first,
    /// used to backfill metrics on startup (§3).
    async fn get_trades(&self, limit: i64) -> Result<Vec<TradeRecord>, PersistenceError>;
}
