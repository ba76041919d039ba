//! §4.3.1–§4.3.3: the primary monitor loop, timeout handling, and
//! cancel-race detection that together make up the Fill Detection Engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tcx_core::{
    BrokerAdapter, BrokerError, DetectionMethod, FillResult, FillStatus, Order, OrderStatus,
};

use crate::clock::Sleeper;
use crate::error_classification::{classify_error, rate_limit_extra_delay_ms, ErrorClass};
use crate::verification::{bulletproof_check, is_partial_fill};

/// Adaptive-polling parameters (§4.3.1: "start at 0.2s, increase by 0.05s
/// per iteration, cap at 1.0s") plus the default top-level deadline (§5:
/// "default 30s").
#[derive(Clone, Copy, Debug)]
pub struct MonitorConfig {
    pub initial_poll: Duration,
    pub poll_increment: Duration,
    pub max_poll: Duration,
    pub default_deadline: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            initial_poll: Duration::from_millis(200),
            poll_increment: Duration::from_millis(50),
            max_poll: Duration::from_secs(1),
            default_deadline: Duration::from_secs(30),
        }
    }
}

/// Error-boundary typed outcome (§7 "typed enums at library boundaries").
/// Wraps the same [`FillResult`] data the monitor returns, letting callers
/// pattern-match without inspecting `FillResult::status` themselves.
#[derive(Clone, Debug)]
pub enum FillOutcome {
    Filled(FillResult),
    Partial(FillResult),
    Rejected(FillResult),
    Timeout(FillResult),
    Error(FillResult),
}

impl From<FillResult> for FillOutcome {
    fn from(result: FillResult) -> Self {
        match result.status {
            FillStatus::Filled => FillOutcome::Filled(result),
            FillStatus::Partial => FillOutcome::Partial(result),
            FillStatus::Rejected => FillOutcome::Rejected(result),
            FillStatus::Timeout => FillOutcome::Timeout(result),
            FillStatus::Error => FillOutcome::Error(result),
        }
    }
}

impl FillOutcome {
    pub fn result(&self) -> &FillResult {
        match self {
            FillOutcome::Filled(r)
            | FillOutcome::Partial(r)
            | FillOutcome::Rejected(r)
            | FillOutcome::Timeout(r)
            | FillOutcome::Error(r) => r,
        }
    }
}

struct Progress {
    status_history: Vec<OrderStatus>,
    checks_performed: Vec<DetectionMethod>,
    api_calls: u32,
    retries: u32,
    started: Instant,
}

impl Progress {
    fn new() -> Self {
        Self {
            status_history: Vec::new(),
            checks_performed: Vec::new(),
            api_calls: 0,
            retries: 0,
            started: Instant::now(),
        }
    }

    fn note_status(&mut self, status: OrderStatus) {
        if self.status_history.last() != Some(&status) {
            self.status_history.push(status);
        }
    }

    fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }
}

pub struct FillMonitor {
    broker: Arc<dyn BrokerAdapter>,
    sleeper: Arc<dyn Sleeper>,
    config: MonitorConfig,
}

impl FillMonitor {
    pub fn new(broker: Arc<dyn BrokerAdapter>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self::with_config(broker, sleeper, MonitorConfig::default())
    }

    pub fn with_config(
        broker: Arc<dyn BrokerAdapter>,
        sleeper: Arc<dyn Sleeper>,
        config: MonitorConfig,
    ) -> Self {
        Self { broker, sleeper, config }
    }

    /// Watch `order_id` (for `symbol`, used only by the ultimate safety
    /// net's position-reconciliation step) until a definitive outcome or
    /// `deadline` elapses. Never panics or propagates a broker error to the
    /// caller — every path returns a [`FillResult`] (§7: "never an
    /// unhandled exception").
    pub async fn watch(&self, order_id: &str, symbol: &str, deadline: Duration) -> FillResult {
        let mut progress = Progress::new();
        let mut poll_interval = self.config.initial_poll;

        loop {
            if progress.started.elapsed() >= deadline {
                break;
            }

            progress.api_calls += 1;
            match self.broker.get_order(order_id).await {
                Ok(order) => {
                    progress.note_status(order.status);
                    let check = bulletproof_check(&order);
                    progress.checks_performed.extend(check.checks_performed.iter().copied());

                    if check.filled {
                        tracing::info!(order_id, method = ?check.primary_method, "fill confirmed");
                        return self.filled_result(&order, check.primary_method, progress);
                    }
                    if is_partial_fill(&order) {
                        return self.partial_result(&order, progress);
                    }
                    if matches!(
                        order.status,
                        OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
                    ) {
                        return self.rejected_result(&order, progress);
                    }
                }
                Err(err) => match classify_error(&err) {
                    ErrorClass::Permanent => {
                        tracing::error!(order_id, error = %err, "permanent error monitoring fill");
                        return self.error_result(err.to_string(), progress);
                    }
                    ErrorClass::Transient => {
                        progress.retries += 1;
                        let extra = rate_limit_extra_delay_ms(&err);
                        self.sleeper
                            .sleep(poll_interval + Duration::from_millis(extra))
                            .await;
                        poll_interval = (poll_interval + self.config.poll_increment).min(self.config.max_poll);
                        continue;
                    }
                    ErrorClass::Ambiguous => {
                        tracing::debug!(order_id, error = %err, "ambiguous error, continuing to monitor");
                    }
                },
            }

            self.sleeper.sleep(poll_interval).await;
            poll_interval = (poll_interval + self.config.poll_increment).min(self.config.max_poll);
        }

        self.handle_timeout(order_id, symbol, progress).await
    }

    /// Convenience for callers (C5's entry watch) that want the default
    /// 30s deadline.
    pub async fn watch_default(&self, order_id: &str, symbol: &str) -> FillResult {
        self.watch(order_id, symbol, self.config.default_deadline).await
    }

    // -- §4.3.3 timeout handling + cancel-race detection --------------------

    async fn handle_timeout(&self, order_id: &str, symbol: &str, mut progress: Progress) -> FillResult {
        // 1. Final status fetch.
        progress.api_calls += 1;
        if let Ok(order) = self.broker.get_order(order_id).await {
            progress.note_status(order.status);
            let check = bulletproof_check(&order);
            progress.checks_performed.extend(check.checks_performed.iter().copied());
            if check.filled {
                return self.filled_result(&order, Some(DetectionMethod::FinalVerification), progress);
            }
        }

        // 2. Attempt cancel.
        match self.broker.cancel_order(order_id).await {
            Ok(()) => {
                // 4. Cancel succeeded: confirm canceled status and report TIMEOUT.
                progress.api_calls += 1;
                let order = self.broker.get_order(order_id).await.ok();
                return self.timeout_result(order.as_ref(), progress);
            }
            Err(cancel_err) => {
                // 3. Cancel-race detection.
                if crate::cancel_race::is_cancel_race_error(&cancel_err.message()) {
                    tracing::warn!(order_id, "cancel failed with already-filled indicator, re-verifying");
                    progress.api_calls += 1;
                    if let Ok(order) = self.broker.get_order(order_id).await {
                        let check = bulletproof_check(&order);
                        progress.checks_performed.extend(check.checks_performed.iter().copied());
                        if check.filled {
                            return self.filled_result(
                                &order,
                                Some(DetectionMethod::CancelRaceDetection),
                                progress,
                            );
                        }
                    }
                    self.sleeper.sleep(Duration::from_millis(200)).await;
                    progress.retries += 1;
                    progress.api_calls += 1;
                    if let Ok(order) = self.broker.get_order(order_id).await {
                        let check = bulletproof_check(&order);
                        progress.checks_performed.extend(check.checks_performed.iter().copied());
                        if check.filled {
                            return self.filled_result(
                                &order,
                                Some(DetectionMethod::CancelRaceDetection),
                                progress,
                            );
                        }
                    }
                }
            }
        }

        // 5. Ultimate safety net.
        for _ in 0..3 {
            self.sleeper.sleep(Duration::from_millis(500)).await;
            progress.api_calls += 1;
            if let Ok(order) = self.broker.get_order(order_id).await {
                let check = bulletproof_check(&order);
                progress.checks_performed.extend(check.checks_performed.iter().copied());
                if check.filled {
                    return self.filled_result(&order, Some(DetectionMethod::UltimateSafetyNet), progress);
                }
            }
        }

        if let Ok(positions) = self.broker.list_positions().await {
            if positions.iter().any(|p| p.symbol == symbol) {
                progress.api_calls += 1;
                if let Ok(order) = self.broker.get_order(order_id).await {
                    let check = bulletproof_check(&order);
                    progress.checks_performed.extend(check.checks_performed.iter().copied());
                    if check.filled {
                        return self.filled_result(&order, Some(DetectionMethod::UltimateSafetyNet), progress);
                    }
                }
            }
        }

        self.timeout_result(None, progress)
    }

    // -- result builders ------------------------------------------------------

    fn filled_result(&self, order: &Order, method: Option<DetectionMethod>, progress: Progress) -> FillResult {
        FillResult {
            filled: true,
            status: FillStatus::Filled,
            fill_price_micros: order.filled_avg_price_micros,
            fill_quantity: order.filled_qty,
            fill_timestamp: order.filled_at,
            detection_method: method,
            checks_performed: progress.checks_performed,
            elapsed_ms: progress.elapsed_ms(),
            api_calls_made: progress.api_calls,
            retries_attempted: progress.retries,
            status_history: progress.status_history,
            last_known_status: Some(order.status),
        }
    }

    fn partial_result(&self, order: &Order, progress: Progress) -> FillResult {
        FillResult {
            filled: false,
            status: FillStatus::Partial,
            fill_price_micros: order.filled_avg_price_micros,
            fill_quantity: order.filled_qty,
            fill_timestamp: order.filled_at,
            detection_method: Some(DetectionMethod::QuantityMatch),
            checks_performed: progress.checks_performed,
            elapsed_ms: progress.elapsed_ms(),
            api_calls_made: progress.api_calls,
            retries_attempted: progress.retries,
            status_history: progress.status_history,
            last_known_status: Some(order.status),
        }
    }

    fn rejected_result(&self, order: &Order, progress: Progress) -> FillResult {
        FillResult {
            filled: false,
            status: FillStatus::Rejected,
            fill_price_micros: None,
            fill_quantity: order.filled_qty,
            fill_timestamp: None,
            detection_method: None,
            checks_performed: progress.checks_performed,
            elapsed_ms: progress.elapsed_ms(),
            api_calls_made: progress.api_calls,
            retries_attempted: progress.retries,
            status_history: progress.status_history,
            last_known_status: Some(order.status),
        }
    }

    fn timeout_result(&self, order: Option<&Order>, progress: Progress) -> FillResult {
        FillResult {
            filled: false,
            status: FillStatus::Timeout,
            fill_price_micros: order.and_then(|o| o.filled_avg_price_micros),
            fill_quantity: order.map(|o| o.filled_qty).unwrap_or(0),
            fill_timestamp: None,
            detection_method: None,
            checks_performed: progress.checks_performed,
            elapsed_ms: progress.elapsed_ms(),
            api_calls_made: progress.api_calls,
            retries_attempted: progress.retries,
            status_history: progress.status_history,
            last_known_status: order.map(|o| o.status),
        }
    }

    fn error_result(&self, _message: String, progress: Progress) -> FillResult {
        FillResult {
            filled: false,
            status: FillStatus::Error,
            fill_price_micros: None,
            fill_quantity: 0,
            fill_timestamp: None,
            detection_method: None,
            checks_performed: progress.checks_performed,
            elapsed_ms: progress.elapsed_ms(),
            api_calls_made: progress.api_calls,
            retries_attempted: progress.retries,
            status_history: progress.status_history,
            last_known_status: None,
        }
    }
}

/// Re-exported so callers holding a `FillMonitor` don't need their own
/// `tcx_core` import just to name the broker error type.
pub type WatchError = BrokerError;
