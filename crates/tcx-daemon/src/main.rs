//! `tcx-daemon` binary entry point: loads `.env`, selects a broker adapter
//! from the environment, and serves the Control API until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tcx_broker_alpaca::AlpacaBrokerAdapter;
use tcx_broker_paper::PaperBrokerAdapter;
use tcx_core::market::SentimentSource;
use tcx_runtime::{spawn_sentiment_poller, Engine};
use tcx_strategy::test_doubles::{StaticFeatureSource, StaticSentimentSource};

const ENV_BROKER_MODE: &str = "TCX_BROKER_MODE";
const ENV_SYMBOLS: &str = "TCX_SYMBOLS";
const ENV_BIND_ADDR: &str = "TCX_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SYMBOLS: &str = "AAPL,MSFT";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let addr: SocketAddr = std::env::var(ENV_BIND_ADDR)
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    let symbols: Vec<String> = std::env::var(ENV_SYMBOLS)
        .unwrap_or_else(|_| DEFAULT_SYMBOLS.to_string())
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    // §6: no feature-engine/sentiment-service implementation is in scope.
    // These static doubles stand in for that external collaborator; a real
    // deployment wires `FeatureSource`/`SentimentSource` to it instead.
    let features = Arc::new(StaticFeatureSource::new());
    let sentiment_source: Arc<dyn SentimentSource> = Arc::new(StaticSentimentSource::new(50.0));
    let sentiment_rx = spawn_sentiment_poller(sentiment_source, std::time::Duration::from_secs(30));

    match std::env::var(ENV_BROKER_MODE).unwrap_or_else(|_| "paper".to_string()).as_str() {
        "live" => {
            let broker = Arc::new(AlpacaBrokerAdapter::from_env()?);
            let engine = Arc::new(Engine::new(broker, features, sentiment_rx, symbols));
            tracing::warn!("trading against the live Alpaca account; trading stays disabled until /v1/sync-state + /v1/trading/enable");
            tcx_daemon::serve(engine, addr).await
        }
        "paper-live" => {
            let broker = Arc::new(AlpacaBrokerAdapter::paper(
                std::env::var("ALPACA_API_KEY_ID").unwrap_or_default(),
                std::env::var("ALPACA_API_SECRET_KEY").unwrap_or_default(),
            ));
            let engine = Arc::new(Engine::new(broker, features, sentiment_rx, symbols));
            tcx_daemon::serve(engine, addr).await
        }
        _ => {
            let broker = Arc::new(PaperBrokerAdapter::new());
            let engine = Arc::new(Engine::new(broker, features, sentiment_rx, symbols));
            tcx_daemon::serve(engine, addr).await
        }
    }
}
