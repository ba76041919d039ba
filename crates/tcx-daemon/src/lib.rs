//! HTTP transport for the trading engine's Control API (§6).
//!
//! This crate is intentionally thin: all control-plane behavior (gating,
//! offline-queue retries, shutdown coordination) lives in `tcx-runtime`.
//! `tcx-daemon` only turns it into Axum routes and a long-running process,
//! so `tcx-cli`'s `run` subcommand can reuse [`serve`] without duplicating
//! the bootstrap.

pub mod api_types;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tcx_core::broker::BrokerAdapter;
use tcx_runtime::Engine;

pub use state::AppState;

/// Interval between background status broadcasts onto the SSE bus.
pub const STATUS_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);
/// Interval between heartbeat events on the SSE bus, independent of status.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
/// Cadence of `ProtectionManager::tick` within the spawned protection loop.
pub const PROTECTION_TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Cadence at which each symbol's entry pipeline is evaluated.
pub const ENTRY_EVAL_INTERVAL: Duration = Duration::from_secs(5);

/// Wires the engine's background loops, builds the Axum router, and serves
/// it on `addr` until the process receives a shutdown signal (Ctrl-C).
///
/// This is the one function both the `tcx-daemon` binary and `tcx-cli run`
/// call; neither should reimplement the loop wiring independently.
pub async fn serve<B: BrokerAdapter + 'static>(engine: Arc<Engine<B>>, addr: SocketAddr) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(engine.clone()));

    state::spawn_heartbeat(state.bus.clone(), HEARTBEAT_INTERVAL);
    state::spawn_status_broadcaster(engine.clone(), state.bus.clone(), STATUS_BROADCAST_INTERVAL);
    engine.spawn_protection_loop();
    engine.spawn_entry_loops(ENTRY_EVAL_INTERVAL);

    let app = routes::build_router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    tracing::info!(%addr, "tcx-daemon listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(engine))
        .await?;
    Ok(())
}

async fn shutdown_signal<B: BrokerAdapter + 'static>(engine: Arc<Engine<B>>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight ticks");
    engine.request_shutdown();
}
