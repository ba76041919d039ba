//! `sqlx`-backed Postgres implementation of [`crate::PersistenceSink`],
//! grounded in this workspace's existing connect-from-env / embedded
//! migrations pattern.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use async_trait::async_trait;

use crate::types::{AdvisoryEntry, LogEntry, MetricsSnapshot, OrderRecord, PositionRecord, TradeEvent, TradeRecord};
use crate::{PersistenceError, PersistenceSink, ENV_DB_URL};

pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using `TCX_DATABASE_URL`, matching this workspace's
    /// connect-from-env convention.
    pub async fn connect_from_env() -> Result<Self> {
        let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    /// Runs the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("db migrate failed")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn trade_event_str(event: TradeEvent) -> &'static str {
    match event {
        TradeEvent::Entry => "entry",
        TradeEvent::PartialExit => "partial_exit",
        TradeEvent::FullExit => "full_exit",
    }
}

fn parse_trade_event(raw: &str) -> Result<TradeEvent, PersistenceError> {
    match raw {
        "entry" => Ok(TradeEvent::Entry),
        "partial_exit" => Ok(TradeEvent::PartialExit),
        "full_exit" => Ok(TradeEvent::FullExit),
        other => Err(PersistenceError::Read(format!("unknown trade event {other}"))),
    }
}

fn side_str(side: tcx_core::Side) -> &'static str {
    match side {
        tcx_core::Side::Long => "long",
        tcx_core::Side::Short => "short",
    }
}

fn parse_side(raw: &str) -> Result<tcx_core::Side, PersistenceError> {
    match raw {
        "long" => Ok(tcx_core::Side::Long),
        "short" => Ok(tcx_core::Side::Short),
        other => Err(PersistenceError::Read(format!("unknown side {other}"))),
    }
}

#[async_trait]
impl PersistenceSink for PostgresPersistence {
    async fn insert_trade(&self, trade: TradeRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            insert into trades (symbol, side, event, qty, price_micros, r_multiple_milli, ts)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&trade.symbol)
        .bind(side_str(trade.side))
        .bind(trade_event_str(trade.event))
        .bind(trade.qty)
        .bind(trade.price_micros)
        .bind(trade.r_multiple_milli)
        .bind(trade.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    async fn insert_order_record(&self, order: OrderRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            insert into order_records
                (client_order_id, broker_order_id, symbol, side, qty, filled_qty, status, ts)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            on conflict (client_order_id) do update set
                broker_order_id = excluded.broker_order_id,
                filled_qty = excluded.filled_qty,
                status = excluded.status,
                ts = excluded.ts
            "#,
        )
        .bind(&order.client_order_id)
        .bind(&order.broker_order_id)
        .bind(&order.symbol)
        .bind(side_str(order.side))
        .bind(order.qty)
        .bind(order.filled_qty)
        .bind(&order.status)
        .bind(order.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    async fn insert_log_entry(&self, entry: LogEntry) -> Result<(), PersistenceError> {
        let level = match entry.level {
            crate::types::LogLevel::Debug => "debug",
            crate::types::LogLevel::Info => "info",
            crate::types::LogLevel::Warn => "warn",
            crate::types::LogLevel::Error => "error",
        };
        sqlx::query(
            r#"
            insert into log_entries (level, message, symbol, ts)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(level)
        .bind(&entry.message)
        .bind(&entry.symbol)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    async fn insert_advisory(&self, advisory: AdvisoryEntry) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            insert into advisories (symbol, message, ts)
            values ($1, $2, $3)
            "#,
        )
        .bind(&advisory.symbol)
        .bind(&advisory.message)
        .bind(advisory.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    async fn upsert_position(&self, position: PositionRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            insert into positions
                (symbol, side, entry_price_micros, quantity, stop_loss_micros,
                 current_price_micros, unrealized_pl_micros, protection_state, last_updated)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            on conflict (symbol) do update set
                side = excluded.side,
                entry_price_micros = excluded.entry_price_micros,
                quantity = excluded.quantity,
                stop_loss_micros = excluded.stop_loss_micros,
                current_price_micros = excluded.current_price_micros,
                unrealized_pl_micros = excluded.unrealized_pl_micros,
                protection_state = excluded.protection_state,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&position.symbol)
        .bind(side_str(position.side))
        .bind(position.entry_price_micros)
        .bind(position.quantity)
        .bind(position.stop_loss_micros)
        .bind(position.current_price_micros)
        .bind(position.unrealized_pl_micros)
        .bind(&position.protection_state)
        .bind(position.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    async fn insert_metrics_snapshot(&self, snapshot: MetricsSnapshot) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            insert into metrics_snapshots
                (tracked_positions, total_unrealized_pl_micros, positions_in_profit, offline_queue_len, ts)
            values ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot.tracked_positions)
        .bind(snapshot.total_unrealized_pl_micros)
        .bind(snapshot.positions_in_profit)
        .bind(snapshot.offline_queue_len)
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    async fn get_trades(&self, limit: i64) -> Result<Vec<TradeRecord>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            select symbol, side, event, qty, price_micros, r_multiple_milli, ts
            from trades
            order by ts desc
            limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::Read(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(TradeRecord {
                    symbol: row.try_get("symbol").map_err(|e| PersistenceError::Read(e.to_string()))?,
                    side: parse_side(&row.try_get::<String, _>("side").map_err(|e| PersistenceError::Read(e.to_string()))?)?,
                    event: parse_trade_event(
                        &row.try_get::<String, _>("event").map_err(|e| PersistenceError::Read(e.to_string()))?,
                    )?,
                    qty: row.try_get("qty").map_err(|e| PersistenceError::Read(e.to_string()))?,
                    price_micros: row.try_get("price_micros").map_err(|e| PersistenceError::Read(e.to_string()))?,
                    r_multiple_milli: row
                        .try_get("r_multiple_milli")
                        .map_err(|e| PersistenceError::Read(e.to_string()))?,
                    timestamp: row.try_get("ts").map_err(|e| PersistenceError::Read(e.to_string()))?,
                })
            })
            .collect()
    }
}
