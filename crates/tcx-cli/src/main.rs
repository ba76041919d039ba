use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tcx_broker_alpaca::AlpacaBrokerAdapter;
use tcx_broker_paper::PaperBrokerAdapter;
use tcx_core::market::SentimentSource;
use tcx_runtime::{spawn_sentiment_poller, Engine};
use tcx_strategy::test_doubles::{StaticFeatureSource, StaticSentimentSource};

#[derive(Parser)]
#[command(name = "tcx")]
#[command(about = "Equities day-trading engine control plane", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon against the broker configured via `TCX_BROKER_MODE`
    /// (defaults to the deterministic paper adapter).
    Run {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        #[arg(long, value_delimiter = ',', default_value = "AAPL,MSFT")]
        symbols: Vec<String>,
    },

    /// Embedded run against `PaperBrokerAdapter`, skipping the HTTP layer
    /// entirely — for local iteration without standing up the daemon.
    Paper {
        #[arg(long, value_delimiter = ',', default_value = "AAPL,MSFT")]
        symbols: Vec<String>,

        #[arg(long, default_value_t = 5)]
        entry_eval_secs: u64,
    },

    /// Compute a layered config hash + print canonical JSON.
    ConfigHash {
        /// Paths in merge order (base -> env -> engine -> risk -> ...).
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Run { bind, symbols } => run_daemon(bind, symbols).await,
        Commands::Paper { symbols, entry_eval_secs } => run_paper(symbols, entry_eval_secs).await,
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tcx_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

async fn run_daemon(bind: SocketAddr, symbols: Vec<String>) -> Result<()> {
    let symbols: Vec<String> = symbols.into_iter().map(|s| s.trim().to_uppercase()).collect();
    let features = Arc::new(StaticFeatureSource::new());
    let sentiment_source: Arc<dyn SentimentSource> = Arc::new(StaticSentimentSource::new(50.0));
    let sentiment_rx = spawn_sentiment_poller(sentiment_source, std::time::Duration::from_secs(30));

    match std::env::var("TCX_BROKER_MODE").unwrap_or_else(|_| "paper".to_string()).as_str() {
        "live" => {
            let broker = Arc::new(AlpacaBrokerAdapter::from_env()?);
            let engine = Arc::new(Engine::new(broker, features, sentiment_rx, symbols));
            tcx_daemon::serve(engine, bind).await
        }
        _ => {
            let broker = Arc::new(PaperBrokerAdapter::new());
            let engine = Arc::new(Engine::new(broker, features, sentiment_rx, symbols));
            tcx_daemon::serve(engine, bind).await
        }
    }
}

/// Runs the engine's background loops in-process against the paper broker,
/// without the Axum transport — useful for smoke-testing strategy changes
/// locally before wiring up the daemon.
async fn run_paper(symbols: Vec<String>, entry_eval_secs: u64) -> Result<()> {
    let symbols: Vec<String> = symbols.into_iter().map(|s| s.trim().to_uppercase()).collect();
    let broker = Arc::new(PaperBrokerAdapter::new());
    let features = Arc::new(StaticFeatureSource::new());
    let sentiment_source: Arc<dyn SentimentSource> = Arc::new(StaticSentimentSource::new(50.0));
    let sentiment_rx = spawn_sentiment_poller(sentiment_source, std::time::Duration::from_secs(30));

    let engine = Arc::new(Engine::new(broker, features, sentiment_rx, symbols));
    engine.sync_state().await?;
    engine.enable_trading().map_err(|gate| anyhow::anyhow!("refused to enable trading: {gate}"))?;

    engine.spawn_protection_loop();
    engine.spawn_entry_loops(std::time::Duration::from_secs(entry_eval_secs));

    tracing::info!("paper engine running, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    engine.request_shutdown();
    Ok(())
}
