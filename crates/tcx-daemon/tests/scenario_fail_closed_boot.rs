//! A freshly booted daemon refuses to enable trading until `/v1/sync-state`
//! has run at least once, and `/v1/status` reflects that refusal rather
//! than silently leaving trading off.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use tcx_broker_paper::PaperBrokerAdapter;
use tcx_core::market::SentimentSnapshot;
use tcx_daemon::state::AppState;
use tcx_runtime::Engine;
use tcx_strategy::test_doubles::StaticFeatureSource;
use tower::ServiceExt;

fn test_engine() -> Arc<Engine<PaperBrokerAdapter>> {
    let broker = Arc::new(PaperBrokerAdapter::new());
    let features = Arc::new(StaticFeatureSource::new());
    let (_tx, rx) = tokio::sync::watch::channel(SentimentSnapshot { score: 50.0, as_of: chrono::Utc::now() });
    Arc::new(Engine::new(broker, features, rx, vec!["AAPL".to_string()]))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes: Bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn enable_trading_is_refused_before_sync_state() {
    let engine = test_engine();
    let state = Arc::new(AppState::new(engine));
    let app = tcx_daemon::routes::build_router(state);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/trading/enable")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["gate"], "reconcile_synced");
}

#[tokio::test]
async fn enable_trading_succeeds_after_sync_state() {
    let engine = test_engine();
    let state = Arc::new(AppState::new(engine));
    let app = tcx_daemon::routes::build_router(state);

    let sync_request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/sync-state")
        .body(axum::body::Body::empty())
        .unwrap();
    let sync_response = app.clone().oneshot(sync_request).await.unwrap();
    assert_eq!(sync_response.status(), axum::http::StatusCode::OK);

    let enable_request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/trading/enable")
        .body(axum::body::Body::empty())
        .unwrap();
    let enable_response = app.oneshot(enable_request).await.unwrap();
    assert_eq!(enable_response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn status_reports_trading_disabled_at_boot() {
    let engine = test_engine();
    let state = Arc::new(AppState::new(engine));
    let app = tcx_daemon::routes::build_router(state);

    let request = axum::http::Request::builder().uri("/v1/status").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["trading_enabled"], false);
}

#[tokio::test]
async fn unknown_symbol_position_lookup_is_not_found() {
    let engine = test_engine();
    let state = Arc::new(AppState::new(engine));
    let app = tcx_daemon::routes::build_router(state);

    let request =
        axum::http::Request::builder().uri("/v1/positions/ZZZZ").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}
