//! Process wiring: assembles C1–C5 behind a single `Engine`, runs their
//! tick/evaluation loops as tokio tasks, and exposes the operator Control
//! API consumed by `tcx-daemon` (§2, §5, §6).

pub mod engine;
pub mod offline_queue;
pub mod status;

pub use engine::{spawn_sentiment_poller, Engine};
pub use offline_queue::OfflineQueue;
pub use status::{compute_metrics, EngineMetrics, EngineStatus, StreamingSnapshot};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tcx_broker_paper::PaperBrokerAdapter;
    use tcx_core::market::{Features, SentimentSnapshot};

    use super::*;

    struct AlwaysStaleFeatures;

    impl tcx_core::market::FeatureSource for AlwaysStaleFeatures {
        fn get_latest_features(&self, _symbol: &str) -> Option<Features> {
            None
        }

        fn recent_price_rsi(&self, _symbol: &str, _n: usize) -> Vec<(i64, f64)> {
            Vec::new()
        }
    }

    fn neutral_sentiment() -> SentimentSnapshot {
        SentimentSnapshot { score: 50.0, as_of: chrono::Utc::now() }
    }

    #[tokio::test]
    async fn engine_reports_disabled_status_after_disable() {
        let broker = Arc::new(PaperBrokerAdapter::new());
        let (_tx, rx) = tokio::sync::watch::channel(neutral_sentiment());
        let engine = Engine::new(broker, Arc::new(AlwaysStaleFeatures), rx, vec!["AAPL".to_string()]);
        engine.disable_trading();
        assert!(!engine.get_engine_status().trading_enabled);
    }

    #[tokio::test]
    async fn offline_queue_starts_empty() {
        let broker = Arc::new(PaperBrokerAdapter::new());
        let (_tx, rx) = tokio::sync::watch::channel(neutral_sentiment());
        let engine = Engine::new(broker, Arc::new(AlwaysStaleFeatures), rx, vec![]);
        assert_eq!(engine.get_engine_status().offline_queue_len, 0);
        let _ = Duration::from_millis(1);
    }
}
