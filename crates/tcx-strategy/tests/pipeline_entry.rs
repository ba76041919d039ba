use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use tcx_broker_paper::PaperBrokerAdapter;
use tcx_core::market::MarketRegime;
use tcx_fill::InstantSleeper;
use tcx_position::PositionTracker;
use tcx_risk::{BreakerConfig, CircuitBreakerRegistry};
use tcx_sequencer::{gates::ReconcileFreshness, OrderSequencer};
use tcx_strategy::pipeline::EvaluationOutcome;
use tcx_strategy::test_doubles::StaticFeatureSource;
use tcx_strategy::StrategyPipeline;
use tokio::sync::watch;

fn trending_buy_features(symbol: &str) -> tcx_core::market::Features {
    tcx_core::market::Features {
        symbol: symbol.to_string(),
        price_micros: 100_000_000,
        ema_short_micros: 101_000_000,
        ema_long_micros: 100_000_000,
        rsi: 60.0,
        macd: 1.0,
        macd_signal: 0.5,
        adx: 30.0,
        atr_micros: 1_000_000,
        volume: 1_500.0,
        volume_avg: 1_000.0,
        volume_ratio: 1.5,
        regime: MarketRegime::Trending,
        regime_multiplier: 1.0,
        as_of: Utc::now(),
    }
}

fn build_pipeline(broker: Arc<PaperBrokerAdapter>, features: Arc<StaticFeatureSource>) -> StrategyPipeline<PaperBrokerAdapter> {
    let breaker = Arc::new(CircuitBreakerRegistry::new(BreakerConfig { failure_threshold: 3, recovery_ms: 60_000 }));
    let reconcile = Arc::new(ReconcileFreshness::new());
    reconcile.mark_synced();
    let sequencer = Arc::new(OrderSequencer::new(broker.clone(), Arc::new(InstantSleeper), breaker, reconcile));
    let (_tx, rx) = watch::channel(tcx_core::market::SentimentSnapshot { score: 50.0, as_of: Utc::now() });
    StrategyPipeline::new(Arc::new(PositionTracker::new()), sequencer, broker, features, rx)
}

#[tokio::test]
async fn healthy_signal_submits_and_fills_a_bracket_entry() {
    let broker = Arc::new(PaperBrokerAdapter::new());
    broker.set_price("AAPL", 100_000_000);
    let features = Arc::new(StaticFeatureSource::new());
    features.set(trending_buy_features("AAPL"));

    let pipeline = build_pipeline(broker.clone(), features);
    let morning = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
    let outcome = pipeline.evaluate_symbol("AAPL", morning, Utc::now()).await;

    match outcome {
        EvaluationOutcome::EntrySubmitted(result) => assert!(result.success),
        other => panic!("expected a submitted entry, got {other:?}"),
    }

    let position = broker.get_position("AAPL").await.unwrap();
    assert!(position.is_some(), "paper broker should show an open position after the bracket entry fills");
}

#[tokio::test]
async fn outside_trading_window_is_rejected_before_any_broker_call() {
    let broker = Arc::new(PaperBrokerAdapter::new());
    let features = Arc::new(StaticFeatureSource::new());
    features.set(trending_buy_features("AAPL"));

    let pipeline = build_pipeline(broker, features);
    let after_hours = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
    let outcome = pipeline.evaluate_symbol("AAPL", after_hours, Utc::now()).await;
    assert_eq!(outcome, EvaluationOutcome::OutsideTradingWindow);
}

#[tokio::test]
async fn missing_features_is_a_no_op() {
    let broker = Arc::new(PaperBrokerAdapter::new());
    let features = Arc::new(StaticFeatureSource::new());
    let pipeline = build_pipeline(broker, features);
    let morning = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
    let outcome = pipeline.evaluate_symbol("MSFT", morning, Utc::now()).await;
    assert_eq!(outcome, EvaluationOutcome::NoFeatures);
}
