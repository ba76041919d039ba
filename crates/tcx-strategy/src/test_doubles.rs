//! Deterministic in-memory doubles for the market-data interfaces C5
//! consumes (§4.5.1, §6 "Sentiment interface"). Not behind `#[cfg(test)]`
//! because other crates' end-to-end scenarios also need a feature/
//! sentiment source that never performs I/O.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tcx_core::market::{FeatureSource, Features, SentimentSnapshot, SentimentSource};

#[derive(Default)]
pub struct StaticFeatureSource {
    latest: Mutex<HashMap<String, Features>>,
    rsi_history: Mutex<HashMap<String, Vec<(i64, f64)>>>,
}

impl StaticFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the latest tick for a symbol and appends `(price, rsi)` to its
    /// history, for [`crate::filters`]/exit-signal tests that need several
    /// samples.
    pub fn set(&self, features: Features) {
        let mut history = self.rsi_history.lock().expect("feature source lock poisoned");
        history.entry(features.symbol.clone()).or_default().push((features.price_micros, features.rsi));
        self.latest.lock().expect("feature source lock poisoned").insert(features.symbol.clone(), features);
    }
}

impl FeatureSource for StaticFeatureSource {
    fn get_latest_features(&self, symbol: &str) -> Option<Features> {
        self.latest.lock().expect("feature source lock poisoned").get(symbol).cloned()
    }

    fn recent_price_rsi(&self, symbol: &str, n: usize) -> Vec<(i64, f64)> {
        let history = self.rsi_history.lock().expect("feature source lock poisoned");
        match history.get(symbol) {
            Some(samples) if samples.len() > n => samples[samples.len() - n..].to_vec(),
            Some(samples) => samples.clone(),
            None => Vec::new(),
        }
    }
}

pub struct StaticSentimentSource {
    snapshot: Mutex<SentimentSnapshot>,
}

impl StaticSentimentSource {
    pub fn new(score: f64) -> Self {
        Self { snapshot: Mutex::new(SentimentSnapshot { score, as_of: Utc::now() }) }
    }

    pub fn set(&self, score: f64) {
        *self.snapshot.lock().expect("sentiment source lock poisoned") = SentimentSnapshot { score, as_of: Utc::now() };
    }
}

impl SentimentSource for StaticSentimentSource {
    fn get_sentiment(&self) -> SentimentSnapshot {
        *self.snapshot.lock().expect("sentiment source lock poisoned")
    }
}
