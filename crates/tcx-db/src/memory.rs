//! In-memory `PersistenceSink` for tests and the `paper` CLI mode — no
//! Postgres required.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{AdvisoryEntry, LogEntry, MetricsSnapshot, OrderRecord, PositionRecord, TradeRecord};
use crate::{PersistenceError, PersistenceSink};

#[derive(Default)]
struct Inner {
    trades: Vec<TradeRecord>,
    orders: Vec<OrderRecord>,
    logs: Vec<LogEntry>,
    advisories: Vec<AdvisoryEntry>,
    positions: HashMap<String, PositionRecord>,
    metrics: Vec<MetricsSnapshot>,
}

#[derive(Default)]
pub struct InMemoryPersistence {
    inner: Mutex<Inner>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trade_count(&self) -> usize {
        self.inner.lock().expect("persistence lock poisoned").trades.len()
    }

    pub fn position(&self, symbol: &str) -> Option<PositionRecord> {
        self.inner.lock().expect("persistence lock poisoned").positions.get(symbol).cloned()
    }
}

#[async_trait]
impl PersistenceSink for InMemoryPersistence {
    async fn insert_trade(&self, trade: TradeRecord) -> Result<(), PersistenceError> {
        self.inner.lock().expect("persistence lock poisoned").trades.push(trade);
        Ok(())
    }

    async fn insert_order_record(&self, order: OrderRecord) -> Result<(), PersistenceError> {
        self.inner.lock().expect("persistence lock poisoned").orders.push(order);
        Ok(())
    }

    async fn insert_log_entry(&self, entry: LogEntry) -> Result<(), PersistenceError> {
        self.inner.lock().expect("persistence lock poisoned").logs.push(entry);
        Ok(())
    }

    async fn insert_advisory(&self, advisory: AdvisoryEntry) -> Result<(), PersistenceError> {
        self.inner.lock().expect("persistence lock poisoned").advisories.push(advisory);
        Ok(())
    }

    async fn upsert_position(&self, position: PositionRecord) -> Result<(), PersistenceError> {
        self.inner
            .lock()
            .expect("persistence lock poisoned")
            .positions
            .insert(position.symbol.clone(), position);
        Ok(())
    }

    async fn insert_metrics_snapshot(&self, snapshot: MetricsSnapshot) -> Result<(), PersistenceError> {
        self.inner.lock().expect("persistence lock poisoned").metrics.push(snapshot);
        Ok(())
    }

    async fn get_trades(&self, limit: i64) -> Result<Vec<TradeRecord>, PersistenceError> {
        let inner = self.inner.lock().expect("persistence lock poisoned");
        let take = limit.max(0) as usize;
        Ok(inner.trades.iter().rev().take(take).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeEvent;
    use chrono::Utc;
    use tcx_core::Side;

    fn trade(symbol: &str) -> TradeRecord {
        TradeRecord {
            symbol: symbol.to_string(),
            side: Side::Long,
            event: TradeEvent::Entry,
            qty: 10,
            price_micros: 100_000_000,
            r_multiple_milli: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_trades_returns_newest_first_bounded_by_limit() {
        let sink = InMemoryPersistence::new();
        for symbol in ["AAA", "BBB", "CCC"] {
            sink.insert_trade(trade(symbol)).await.unwrap();
        }
        let recent = sink.get_trades(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].symbol, "CCC");
        assert_eq!(recent[1].symbol, "BBB");
    }

    #[tokio::test]
    async fn upsert_position_replaces_prior_row_for_same_symbol() {
        let sink = InMemoryPersistence::new();
        let mut record = PositionRecord {
            symbol: "AAPL".to_string(),
            side: Side::Long,
            entry_price_micros: 100_000_000,
            quantity: 10,
            stop_loss_micros: 99_000_000,
            current_price_micros: 101_000_000,
            unrealized_pl_micros: 10_000_000,
            protection_state: "INITIAL_RISK".to_string(),
            last_updated: Utc::now(),
        };
        sink.upsert_position(record.clone()).await.unwrap();
        record.current_price_micros = 102_000_000;
        sink.upsert_position(record.clone()).await.unwrap();

        assert_eq!(sink.position("AAPL").unwrap().current_price_micros, 102_000_000);
    }
}
