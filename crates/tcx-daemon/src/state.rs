//! Shared runtime state for `tcx-daemon`.
//!
//! All types here are `Clone`-able (via `Arc`). Handlers receive
//! `State<Arc<AppState<B>>>` from Axum; this module owns nothing async
//! itself — the actual control-plane logic lives in `tcx_runtime::Engine`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tcx_core::broker::BrokerAdapter;
use tcx_core::{Order, Position};
use tcx_runtime::{EngineMetrics, EngineStatus};
use tokio::sync::broadcast;

/// Messages broadcast over the internal event bus and surfaced as SSE
/// events (§6 "Streaming snapshot").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(EngineStatus),
    LogLine { level: String, message: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (`Arc`) handle shared across all Axum handlers, generic over
/// the broker implementation so the same router serves both paper and
/// live (Alpaca) runs (§5 "Runtime").
pub struct AppState<B: BrokerAdapter + 'static> {
    pub engine: Arc<tcx_runtime::Engine<B>>,
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
}

impl<B: BrokerAdapter + 'static> AppState<B> {
    pub fn new(engine: Arc<tcx_runtime::Engine<B>>) -> Self {
        let (bus, _rx) = broadcast::channel(1024);
        Self {
            engine,
            bus,
            build: BuildInfo { service: "tcx-daemon", version: env!("CARGO_PKG_VERSION") },
        }
    }
}

pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}

/// Emits a heartbeat SSE event on `interval`; `build_router`'s stream
/// handler subscribes to the same bus.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: chrono::Utc::now().timestamp_millis() });
        }
    });
}

/// Periodically pushes the engine's status onto the bus so SSE clients
/// see state changes without polling `GET /v1/status`.
pub fn spawn_status_broadcaster<B: BrokerAdapter + 'static>(
    engine: Arc<tcx_runtime::Engine<B>>,
    bus: broadcast::Sender<BusMsg>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let _ = bus.send(BusMsg::Status(engine.get_engine_status()));
        }
    });
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub metrics: EngineMetrics,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlattenAllResponse {
    pub results: Vec<FlattenResult>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlattenResult {
    pub symbol: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncStateResponse {
    pub synced_positions: usize,
}
