//! Per-operation circuit breaker (§7: "5 failures -> OPEN, 60s recovery").
//! Keyed by operation name so a run of stop-update failures on one symbol
//! doesn't trip the breaker for an unrelated read-only call. Every
//! transition takes "now" as an explicit millisecond timestamp rather than
//! reading the wall clock, matching this crate's tick/evaluate style.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Copy, Clone, Debug)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_ms: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_ms: 60_000 }
    }
}

#[derive(Clone, Debug)]
pub struct OperationBreaker {
    state: BreakerState,
    failure_count: u32,
    opened_at_ms: Option<i64>,
}

impl OperationBreaker {
    fn new() -> Self {
        Self { state: BreakerState::Closed, failure_count: 0, opened_at_ms: None }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    fn allow(&mut self, cfg: &BreakerConfig, now_ms: i64) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let opened = self.opened_at_ms.unwrap_or(now_ms);
                if now_ms - opened >= cfg.recovery_ms {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.opened_at_ms = None;
    }

    fn on_failure(&mut self, cfg: &BreakerConfig, now_ms: i64) {
        self.failure_count += 1;
        if self.state == BreakerState::HalfOpen || self.failure_count >= cfg.failure_threshold {
            self.state = BreakerState::Open;
            self.opened_at_ms = Some(now_ms);
        }
    }
}

/// Registry of per-operation breakers. Cheap to share behind an `Arc`
/// across the tasks that call broker operations (C2's gates, C3's monitor,
/// C4's sync-on-startup).
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, OperationBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, breakers: Mutex::new(HashMap::new()) }
    }

    /// True if a call for `operation` may proceed right now. OPEN breakers
    /// transition to HALF_OPEN once `recovery_ms` has elapsed, admitting a
    /// single trial call.
    pub fn allow(&self, operation: &str, now_ms: i64) -> bool {
        let mut breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        let entry = breakers.entry(operation.to_string()).or_insert_with(OperationBreaker::new);
        entry.allow(&self.config, now_ms)
    }

    pub fn on_success(&self, operation: &str) {
        let mut breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        let entry = breakers.entry(operation.to_string()).or_insert_with(OperationBreaker::new);
        entry.on_success();
    }

    pub fn on_failure(&self, operation: &str, now_ms: i64) {
        let mut breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        let entry = breakers.entry(operation.to_string()).or_insert_with(OperationBreaker::new);
        entry.on_failure(&self.config, now_ms);
    }

    pub fn state_of(&self, operation: &str) -> BreakerState {
        let breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        breakers.get(operation).map(|b| b.state()).unwrap_or(BreakerState::Closed)
    }

    /// True if any tracked operation is currently OPEN — used by C2's
    /// integrity-armed gate to refuse all sequencing while in RECOVERY.
    pub fn any_open(&self, now_ms: i64) -> bool {
        let breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        breakers.values().any(|b| match b.state {
            BreakerState::Open => {
                let opened = b.opened_at_ms.unwrap_or(now_ms);
                now_ms - opened < self.config.recovery_ms
            }
            _ => false,
        })
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_until_failure_threshold_reached() {
        let reg = CircuitBreakerRegistry::new(BreakerConfig { failure_threshold: 5, recovery_ms: 60_000 });
        for i in 0..4 {
            reg.on_failure("submit_order", i * 1_000);
            assert_eq!(reg.state_of("submit_order"), BreakerState::Closed);
        }
        reg.on_failure("submit_order", 4_000);
        assert_eq!(reg.state_of("submit_order"), BreakerState::Open);
    }

    #[test]
    fn open_refuses_until_recovery_elapses_then_half_opens() {
        let reg = CircuitBreakerRegistry::new(BreakerConfig { failure_threshold: 1, recovery_ms: 60_000 });
        reg.on_failure("cancel_order", 0);
        assert!(!reg.allow("cancel_order", 30_000));
        assert!(reg.allow("cancel_order", 61_000));
        assert_eq!(reg.state_of("cancel_order"), BreakerState::HalfOpen);
    }

    #[test]
    fn success_in_half_open_closes_and_resets_count() {
        let reg = CircuitBreakerRegistry::new(BreakerConfig { failure_threshold: 1, recovery_ms: 1_000 });
        reg.on_failure("cancel_order", 0);
        assert!(reg.allow("cancel_order", 1_001));
        reg.on_success("cancel_order");
        assert_eq!(reg.state_of("cancel_order"), BreakerState::Closed);
        assert_eq!(reg.breakers.lock().unwrap().get("cancel_order").unwrap().failure_count(), 0);
    }

    #[test]
    fn failure_in_half_open_reopens_immediately() {
        let reg = CircuitBreakerRegistry::new(BreakerConfig { failure_threshold: 5, recovery_ms: 1_000 });
        reg.on_failure("submit_order", 0);
        assert!(!reg.allow("submit_order", 500));
        assert!(reg.allow("submit_order", 1_001));
        reg.on_failure("submit_order", 1_001);
        assert_eq!(reg.state_of("submit_order"), BreakerState::Open);
        assert!(!reg.allow("submit_order", 1_500));
    }

    #[test]
    fn unknown_operation_starts_closed() {
        let reg = CircuitBreakerRegistry::default();
        assert_eq!(reg.state_of("never_called"), BreakerState::Closed);
        assert!(reg.allow("never_called", 0));
    }

    #[test]
    fn any_open_reports_true_while_within_recovery_window() {
        let reg = CircuitBreakerRegistry::new(BreakerConfig { failure_threshold: 1, recovery_ms: 60_000 });
        assert!(!reg.any_open(0));
        reg.on_failure("submit_order", 0);
        assert!(reg.any_open(30_000));
        assert!(!reg.any_open(61_000));
    }
}
