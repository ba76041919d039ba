//! Types returned by the Control API (§6 [produced] "Control API").

use serde::{Deserialize, Serialize};
use tcx_core::{Order, Position};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineStatus {
    pub trading_enabled: bool,
    pub recovery_mode: bool,
    pub tracked_positions: usize,
    pub reconcile_synced: bool,
    pub offline_queue_len: usize,
    pub offline_queue_dropped: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub tracked_positions: usize,
    pub total_unrealized_pl_micros: i64,
    pub positions_in_profit: usize,
    pub offline_queue_len: usize,
}

pub fn compute_metrics(positions: &[Position], offline_queue_len: usize) -> EngineMetrics {
    let total_unrealized_pl_micros = positions.iter().map(|p| p.unrealized_pl_micros).sum();
    let positions_in_profit = positions.iter().filter(|p| p.is_profitable()).count();
    EngineMetrics {
        tracked_positions: positions.len(),
        total_unrealized_pl_micros,
        positions_in_profit,
        offline_queue_len,
    }
}

/// Streaming snapshot (§6 [produced] "Streaming snapshot"): current
/// metrics, positions, open orders, and the last N log entries the
/// broadcaster (out of scope here) fans out over SSE/WebSocket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamingSnapshot {
    pub metrics: EngineMetrics,
    pub positions: Vec<Position>,
    pub open_orders: Vec<Order>,
}
