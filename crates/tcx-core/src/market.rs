//! Market-data feature and sentiment interfaces (§6 "consumed" interfaces,
//! §4.5.1 feature contract). Both C4 and C5 consume these; neither computes
//! an indicator itself — the feature engine and sentiment service are
//! external collaborators specified only at their contracts (§1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse regime label attached to a feature tick. The feature engine
/// assigns this; the core only ever reads it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Trending,
    Choppy,
    Volatile,
    Calm,
}

/// Per-symbol feature tick (§4.5.1). `price_micros` prefers a real-time
/// last-trade price over bar close (§9 "avoid stale-price entries").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub symbol: String,
    pub price_micros: i64,
    pub ema_short_micros: i64,
    pub ema_long_micros: i64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub adx: f64,
    pub atr_micros: i64,
    pub volume: f64,
    pub volume_avg: f64,
    pub volume_ratio: f64,
    pub regime: MarketRegime,
    /// In `[0, 1]`.
    pub regime_multiplier: f64,
    pub as_of: DateTime<Utc>,
}

impl Features {
    /// Staleness per §6 "staleness must be detectable by the caller
    /// (timestamp field)".
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.as_of) > max_age
    }
}

/// Supplies feature ticks and the short `(price, rsi)` history C4 needs for
/// bearish-divergence detection (§4.4.3). Never computes an indicator; both
/// are produced upstream by the feature engine (§4.5.1, out of scope here).
pub trait FeatureSource: Send + Sync {
    fn get_latest_features(&self, symbol: &str) -> Option<Features>;

    /// Up to `n` most recent `(price_micros, rsi)` samples, oldest first.
    /// May return fewer than `n` if insufficient history exists.
    fn recent_price_rsi(&self, symbol: &str, n: usize) -> Vec<(i64, f64)>;
}

/// Sentiment snapshot (§6 "Sentiment interface"). `score` is in `[0, 100]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub score: f64,
    pub as_of: DateTime<Utc>,
}

impl SentimentSnapshot {
    pub fn classification(&self) -> &'static str {
        match self.score {
            s if s >= 55.0 => "bullish",
            s if s < 20.0 => "fearful",
            s if s < 35.0 => "cautious",
            _ => "neutral",
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.as_of) > max_age
    }
}

/// Source of sentiment readings. §5.5.7/§9: may be async upstream, but the
/// evaluation path only ever reads the last cached value — see SPEC's
/// "C5 caches the last value to avoid blocking the evaluation path".
pub trait SentimentSource: Send + Sync {
    fn get_sentiment(&self) -> SentimentSnapshot;
}
