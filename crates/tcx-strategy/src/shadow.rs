//! §4.5.7 shadow-mode ML observer. Strictly fire-and-forget: the pipeline
//! never awaits this, never lets it veto or resize a trade, and the
//! blending weight ω is hard-pinned to 0 in shadow mode so the blended
//! confidence always equals the strategy confidence the caller already
//! acted on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tcx_core::market::Features;

/// The consumed ML-observer interface (§4.5.7). `predict` returns the raw
/// model confidence before blending; the blend itself (`ω·model +
/// (1-ω)·strategy`) happens in [`blend`], never inside the observer.
#[async_trait]
pub trait ShadowObserver: Send + Sync {
    async fn predict(&self, symbol: &str, features: &Features) -> f64;
}

/// ω=0: the blended value equals `strategy_confidence` exactly, per
/// §4.5.7's shadow-mode definition.
pub const SHADOW_WEIGHT: f64 = 0.0;

pub fn blend(model_confidence: f64, strategy_confidence: f64) -> f64 {
    SHADOW_WEIGHT * model_confidence + (1.0 - SHADOW_WEIGHT) * strategy_confidence
}

/// Default observer used when no model is wired up: a constant prediction
/// equal to whatever strategy confidence it is asked about, so `blend`
/// trivially returns the strategy confidence either way.
pub struct NullObserver;

#[async_trait]
impl ShadowObserver for NullObserver {
    async fn predict(&self, _symbol: &str, _features: &Features) -> f64 {
        0.0
    }
}

/// Receives a `(symbol, features, strategy_confidence, blended_confidence)`
/// tuple for later evaluation. Implementations may persist asynchronously;
/// this hook is never on the synchronous entry-decision path (§4.5.7 "the
/// prediction and outcome are recorded for later evaluation").
#[async_trait]
pub trait ShadowSink: Send + Sync {
    async fn record_prediction(&self, symbol: &str, strategy_confidence: f64, blended_confidence: f64);
}

pub struct NullSink;

#[async_trait]
impl ShadowSink for NullSink {
    async fn record_prediction(&self, _symbol: &str, _strategy_confidence: f64, _blended_confidence: f64) {}
}

/// Spawns the shadow observation as an independent task and returns
/// immediately. The caller's entry decision has already been made with
/// `strategy_confidence` before this is ever called — nothing this task
/// does can retroactively change it.
pub fn spawn_shadow_observation(
    observer: Arc<dyn ShadowObserver>,
    sink: Arc<dyn ShadowSink>,
    symbol: String,
    features: Features,
    strategy_confidence: f64,
) {
    tokio::spawn(async move {
        let model_confidence = match tokio::time::timeout(Duration::from_millis(500), observer.predict(&symbol, &features)).await {
            Ok(confidence) => confidence,
            Err(_) => {
                tracing::warn!(symbol = %symbol, "shadow observer timed out, recording strategy confidence unblended");
                strategy_confidence
            }
        };
        let blended = blend(model_confidence, strategy_confidence);
        sink.record_prediction(&symbol, strategy_confidence, blended).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tcx_core::market::MarketRegime;

    fn features() -> Features {
        Features {
            symbol: "AAPL".to_string(),
            price_micros: 100_000_000,
            ema_short_micros: 101_000_000,
            ema_long_micros: 100_000_000,
            rsi: 60.0,
            macd: 1.0,
            macd_signal: 0.5,
            adx: 30.0,
            atr_micros: 1_000_000,
            volume: 1_000.0,
            volume_avg: 800.0,
            volume_ratio: 1.25,
            regime: MarketRegime::Trending,
            regime_multiplier: 1.0,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn shadow_weight_is_pinned_to_zero() {
        assert_eq!(blend(99.0, 42.0), 42.0);
    }

    #[tokio::test]
    async fn spawn_is_fire_and_forget_and_does_not_block_caller() {
        struct SlowObserver;
        #[async_trait]
        impl ShadowObserver for SlowObserver {
            async fn predict(&self, _symbol: &str, _features: &Features) -> f64 {
                tokio::time::sleep(Duration::from_secs(5)).await;
                100.0
            }
        }

        struct FlagSink(Arc<AtomicBool>);
        #[async_trait]
        impl ShadowSink for FlagSink {
            async fn record_prediction(&self, _symbol: &str, _strategy_confidence: f64, _blended_confidence: f64) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let recorded = Arc::new(AtomicBool::new(false));
        let started = std::time::Instant::now();
        spawn_shadow_observation(Arc::new(SlowObserver), Arc::new(FlagSink(recorded.clone())), "AAPL".to_string(), features(), 80.0);
        assert!(started.elapsed() < Duration::from_millis(50), "spawn must return immediately");
        assert!(!recorded.load(Ordering::SeqCst), "observer must not have run synchronously");
    }
}
