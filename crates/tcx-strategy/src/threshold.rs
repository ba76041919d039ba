//! §4.5.4 adaptive confidence threshold: per-direction base thresholds
//! modulated by the feature engine's regime multiplier and the cached
//! sentiment score, with a global pause condition and a short-side cap.

use tcx_core::market::{MarketRegime, SentimentSnapshot};

use crate::signal::Direction;

#[derive(Clone, Copy, Debug)]
pub struct ThresholdConfig {
    pub base_buy_threshold: f64,
    pub base_sell_threshold: f64,
    /// §4.5.4: "capped at 0.75" — expressed on the same 0-100 confidence
    /// scale as [`crate::signal::Signal::confidence`], so 75.0.
    pub short_cap: f64,
    /// Below this sentiment score, combined with an adverse regime, entries
    /// pause entirely regardless of confidence.
    pub pause_sentiment_floor: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            base_buy_threshold: 60.0,
            base_sell_threshold: 60.0,
            short_cap: 75.0,
            pause_sentiment_floor: 10.0,
        }
    }
}

fn is_adverse_regime(regime: MarketRegime) -> bool {
    matches!(regime, MarketRegime::Volatile | MarketRegime::Choppy)
}

/// Returns `None` when the global pause condition is in effect; otherwise
/// the confidence threshold `direction` must clear.
pub fn adaptive_threshold(
    config: &ThresholdConfig,
    direction: Direction,
    regime: MarketRegime,
    regime_multiplier: f64,
    sentiment: SentimentSnapshot,
) -> Option<f64> {
    if sentiment.score < config.pause_sentiment_floor && is_adverse_regime(regime) {
        return None;
    }

    let regime_adjustment = (regime_multiplier - 0.5) * 10.0;

    let threshold = match direction {
        Direction::Buy => {
            let bullish_relief = (sentiment.score - 70.0).max(0.0) * 0.2;
            (config.base_buy_threshold - regime_adjustment - bullish_relief).clamp(40.0, 90.0)
        }
        Direction::Sell => {
            let fear_escalation = (config.pause_sentiment_floor - sentiment.score).max(0.0) * 1.5;
            let raw = config.base_sell_threshold - regime_adjustment + fear_escalation;
            raw.min(config.short_cap).clamp(40.0, config.short_cap)
        }
        Direction::None => return None,
    };

    Some(threshold)
}
