//! §4.5.3 filter 3: per-symbol cooldown. Deterministic — callers supply
//! "now" explicitly (matching `tcx_risk`'s no-wall-clock-reads convention)
//! rather than the tracker reading the clock itself.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

const COOLDOWN_SECS: i64 = 180;

/// Last-submission timestamp per symbol. A fresh tracker has no entries, so
/// every symbol is eligible until its first submission.
#[derive(Default)]
pub struct CooldownTracker {
    last_submitted: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a prior order for `symbol` was submitted within the last
    /// 180s of `now`.
    pub fn is_on_cooldown(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let last = self.last_submitted.lock().expect("cooldown tracker lock poisoned");
        match last.get(symbol) {
            Some(ts) => now.signed_duration_since(*ts).num_seconds() < COOLDOWN_SECS,
            None => false,
        }
    }

    pub fn record_submission(&self, symbol: &str, now: DateTime<Utc>) {
        self.last_submitted.lock().expect("cooldown tracker lock poisoned").insert(symbol.to_string(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn symbol_is_eligible_before_any_submission() {
        let tracker = CooldownTracker::new();
        assert!(!tracker.is_on_cooldown("AAPL", Utc::now()));
    }

    #[test]
    fn symbol_is_blocked_within_180s_of_submission() {
        let tracker = CooldownTracker::new();
        let t0 = Utc::now();
        tracker.record_submission("AAPL", t0);
        assert!(tracker.is_on_cooldown("AAPL", t0 + Duration::seconds(179)));
        assert!(!tracker.is_on_cooldown("AAPL", t0 + Duration::seconds(181)));
    }

    #[test]
    fn cooldown_is_per_symbol() {
        let tracker = CooldownTracker::new();
        tracker.record_submission("AAPL", Utc::now());
        assert!(!tracker.is_on_cooldown("MSFT", Utc::now()));
    }
}
