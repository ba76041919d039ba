//! Axum router and HTTP handlers for `tcx-daemon` — the thin transport
//! layer over `tcx_runtime::Engine`'s Control API (§6).
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware. All handlers are `pub(crate)` so the scenario
//! tests in `tests/` can compose the router directly.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use tcx_core::broker::BrokerAdapter;
use tokio_stream::wrappers::BroadcastStream;

use crate::api_types::GateRefusedResponse;
use crate::state::{
    AppState, BusMsg, FlattenAllResponse, FlattenResult, MetricsResponse, OrdersResponse,
    PositionsResponse, SyncStateResponse,
};

pub fn build_router<B: BrokerAdapter + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        .route("/v1/trading/enable", post(enable_trading::<B>))
        .route("/v1/trading/disable", post(disable_trading::<B>))
        .route("/v1/flatten-all", post(flatten_all::<B>))
        .route("/v1/status", get(status::<B>))
        .route("/v1/sync-state", post(sync_state::<B>))
        .route("/v1/positions", get(positions::<B>))
        .route("/v1/positions/:symbol", get(position_by_symbol::<B>))
        .route("/v1/orders", get(orders::<B>))
        .route("/v1/metrics", get(metrics::<B>))
        .route("/v1/stream", get(stream::<B>))
        .with_state(state)
}

async fn enable_trading<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    match st.engine.enable_trading() {
        Ok(()) => (StatusCode::OK, Json(st.engine.get_engine_status())).into_response(),
        Err(gate) => (
            StatusCode::FORBIDDEN,
            Json(GateRefusedResponse {
                error: format!("GATE_REFUSED: {gate} not satisfied; call /v1/sync-state first"),
                gate: gate.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn disable_trading<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    st.engine.disable_trading();
    (StatusCode::OK, Json(st.engine.get_engine_status())).into_response()
}

async fn flatten_all<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    let results = st
        .engine
        .flatten_all()
        .await
        .into_iter()
        .map(|(symbol, outcome)| FlattenResult {
            symbol,
            ok: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
        })
        .collect();
    (StatusCode::OK, Json(FlattenAllResponse { results })).into_response()
}

async fn status<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    let snapshot = st.engine.get_engine_status();
    let _ = st.bus.send(BusMsg::Status(snapshot.clone()));
    (StatusCode::OK, Json(snapshot)).into_response()
}

async fn sync_state<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    match st.engine.sync_state().await {
        Ok(synced_positions) => (StatusCode::OK, Json(SyncStateResponse { synced_positions })).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(GateRefusedResponse { error: err.to_string(), gate: "broker_reachable".to_string() }),
        )
            .into_response(),
    }
}

async fn positions<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    (StatusCode::OK, Json(PositionsResponse { positions: st.engine.get_positions() })).into_response()
}

async fn position_by_symbol<B: BrokerAdapter + 'static>(
    State(st): State<Arc<AppState<B>>>,
    Path(symbol): Path<String>,
) -> Response {
    match st.engine.get_position_summary(&symbol) {
        Some(position) => (StatusCode::OK, Json(position)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "no open position for symbol" })))
            .into_response(),
    }
}

async fn orders<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    match st.engine.get_orders().await {
        Ok(orders) => (StatusCode::OK, Json(OrdersResponse { orders })).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn metrics<B: BrokerAdapter + 'static>(State(st): State<Arc<AppState<B>>>) -> Response {
    (StatusCode::OK, Json(MetricsResponse { metrics: st.engine.get_metrics() })).into_response()
}

async fn stream<B: BrokerAdapter + 'static>(
    State(st): State<Arc<AppState<B>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = st.bus.subscribe();
    let events = BroadcastStream::new(rx).filter_map(|msg| async move {
        let msg = msg.ok()?;
        Some(Ok(Event::default().json_data(&msg).unwrap_or_else(|_| Event::default())))
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
