//! The atomic per-symbol sequences (§4.2 `execute_stop_update`,
//! `execute_partial_exit_with_stop_update`). Every broker mutation here
//! runs under the symbol's lock, behind the three gates (§4.2 [ADDED]),
//! with conflict detection up front and a rollback path that actually
//! resubmits the canceled order(s) rather than just reporting success
//! (§4.2 [ADDED] "Rollback must be real").

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tcx_core::{
    client_order_id, BracketLeg, Order, OrderConflict, OrderStatus, OrderType, SequenceResult, Side,
    SubmitOrderRequest, TimeInForce,
};
use tcx_core::broker::BrokerAdapter;
use tcx_fill::{FillMonitor, MonitorConfig, Sleeper};
use tcx_risk::CircuitBreakerRegistry;
use uuid::Uuid;

use crate::backoff::retry_with_backoff;
use crate::conflicts::{detect_conflicts, SequenceOp};
use crate::gates::{check_integrity_gate, check_reconcile_gate, GateCheck, ReconcileFreshness};
use crate::lock_map::SymbolLockMap;

/// Tunables for the polling/timeout steps in §4.2's numbered sequences.
#[derive(Clone, Copy, Debug)]
pub struct SequencerConfig {
    /// How often to re-poll an order while waiting for a status (§4.2 step
    /// 4/7: "poll until ... or N timeout").
    pub poll_interval: Duration,
    /// §4.2 step 4: cancel-then-wait timeout for the old stop.
    pub cancel_timeout: Duration,
    /// §4.2 step 7: wait for the new stop to reach an active status.
    pub new_order_active_timeout: Duration,
    /// §4.2 partial-exit step 4: wait for the market order to fill.
    pub partial_exit_fill_timeout: Duration,
    /// Max retries for `retry_with_backoff` (§4.2.1 cancel-then-abort).
    pub cancel_max_retries: u32,
    /// §5 "the Fill Detection Engine has a top-level deadline (default
    /// 30s)" — applied to a bracket entry submitted by C5.
    pub entry_fill_timeout: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            cancel_timeout: Duration::from_secs(2),
            new_order_active_timeout: Duration::from_secs(2),
            partial_exit_fill_timeout: Duration::from_secs(5),
            cancel_max_retries: 3,
            entry_fill_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of [`OrderSequencer::execute_entry`] (§4.5.6): a successful
/// submission hands back the realized fill so C4 can construct the
/// resulting Position from the actual fill price, not the requested price.
#[derive(Clone, Debug)]
pub struct EntryOutcome {
    pub result: SequenceResult,
    pub order: Option<Order>,
}

/// Outcome of [`OrderSequencer::execute_partial_exit_with_stop_update`]
/// (§4.2): alongside the [`SequenceResult`] trace, hands back the realized
/// exit fill so the caller (C4) can reconcile C1 via `record_partial_exit`
/// with the actual fill price rather than the pre-trade quote (§2 "C1 is
/// the single source of truth"). `None`/`0` when the exit never filled.
#[derive(Clone, Debug)]
pub struct PartialExitOutcome {
    pub result: SequenceResult,
    pub fill_price_micros: Option<i64>,
    pub fill_quantity: i64,
}

impl PartialExitOutcome {
    fn unfilled(result: SequenceResult) -> Self {
        Self { result, fill_price_micros: None, fill_quantity: 0 }
    }
}

/// Snapshot of a canceled order's shape, captured before the cancel so a
/// failed sequence can resubmit it byte-for-byte during rollback.
#[derive(Clone, Debug)]
struct CanceledOrderSnapshot {
    order_type: OrderType,
    qty: i64,
    is_buy: bool,
    stop_price_micros: Option<i64>,
    limit_price_micros: Option<i64>,
}

impl CanceledOrderSnapshot {
    fn from_order(order: &Order) -> Self {
        Self {
            order_type: order.order_type,
            qty: order.qty - order.filled_qty,
            is_buy: order.is_buy,
            stop_price_micros: order.stop_price_micros,
            limit_price_micros: order.limit_price_micros,
        }
    }
}

/// The Order Sequencer (C2). Owns the symbol lock map and the gate state
/// every sequence checks before touching the broker.
pub struct OrderSequencer<B: BrokerAdapter> {
    broker: Arc<B>,
    sleeper: Arc<dyn Sleeper>,
    locks: Arc<SymbolLockMap>,
    breaker: Arc<CircuitBreakerRegistry>,
    reconcile: Arc<ReconcileFreshness>,
    config: SequencerConfig,
}

impl<B: BrokerAdapter + 'static> OrderSequencer<B> {
    pub fn new(
        broker: Arc<B>,
        sleeper: Arc<dyn Sleeper>,
        breaker: Arc<CircuitBreakerRegistry>,
        reconcile: Arc<ReconcileFreshness>,
    ) -> Self {
        Self::with_config(broker, sleeper, breaker, reconcile, SequencerConfig::default())
    }

    pub fn with_config(
        broker: Arc<B>,
        sleeper: Arc<dyn Sleeper>,
        breaker: Arc<CircuitBreakerRegistry>,
        reconcile: Arc<ReconcileFreshness>,
        config: SequencerConfig,
    ) -> Self {
        Self { broker, sleeper, locks: Arc::new(SymbolLockMap::new()), breaker, reconcile, config }
    }

    pub fn reconcile_freshness(&self) -> &ReconcileFreshness {
        &self.reconcile
    }

    fn new_sequence_id() -> String {
        format!("seq-{}", Uuid::new_v4())
    }

    /// §4.2 [ADDED] gate enforcement: integrity armed, then the per-symbol
    /// lock (acquired structurally, waiting rather than refusing per
    /// §4.2.1), then reconcile-freshness. Returns `Err(refused_result)` if
    /// either boolean gate fails; otherwise the acquired symbol guard.
    async fn enforce_gates_and_lock(
        &self,
        sequence_id: &str,
        symbol: &str,
    ) -> Result<(crate::lock_map::SymbolGuard, bool), SequenceResult> {
        let now_ms = Utc::now().timestamp_millis();
        if let GateCheck::Refused(gate) = check_integrity_gate(&self.breaker, now_ms) {
            return Err(SequenceResult::refused(sequence_id, gate));
        }

        let contended = self.locks.is_locked(symbol);
        let guard = self.locks.acquire(symbol).await;

        if let GateCheck::Refused(gate) = check_reconcile_gate(&self.reconcile) {
            return Err(SequenceResult::refused(sequence_id, gate));
        }

        Ok((guard, contended))
    }

    async fn poll_until(
        &self,
        order_id: &str,
        timeout: Duration,
        predicate: impl Fn(&Order) -> bool,
    ) -> Option<Order> {
        let started = Instant::now();
        loop {
            if let Ok(order) = self.broker.get_order(order_id).await {
                if predicate(&order) {
                    return Some(order);
                }
            }
            if started.elapsed() >= timeout {
                return None;
            }
            self.sleeper.sleep(self.config.poll_interval).await;
        }
    }

    fn stop_order_request(&self, symbol: &str, position_qty: i64, new_stop_micros: i64, now_ms: i64) -> SubmitOrderRequest {
        let is_buy = position_qty < 0;
        let side = if position_qty >= 0 { Side::Long } else { Side::Short };
        let coid = client_order_id(symbol, side, position_qty.abs(), new_stop_micros, tcx_core::idempotency::floor_to_minute_ms(now_ms));
        SubmitOrderRequest {
            client_order_id: coid,
            symbol: symbol.to_string(),
            qty: position_qty.abs(),
            side,
            is_buy,
            order_type: OrderType::Stop,
            tif: TimeInForce::Gtc,
            limit_price_micros: None,
            stop_price_micros: Some(new_stop_micros),
            bracket_legs: Vec::new(),
        }
    }

    async fn resubmit_snapshot(
        &self,
        symbol: &str,
        snapshot: &CanceledOrderSnapshot,
        now_ms: i64,
    ) -> Result<Order, tcx_core::BrokerError> {
        let side = if snapshot.is_buy { Side::Short } else { Side::Long };
        let coid = client_order_id(
            symbol,
            side,
            snapshot.qty,
            snapshot.stop_price_micros.or(snapshot.limit_price_micros).unwrap_or(0),
            tcx_core::idempotency::floor_to_minute_ms(now_ms),
        );
        let request = SubmitOrderRequest {
            client_order_id: coid,
            symbol: symbol.to_string(),
            qty: snapshot.qty,
            side,
            is_buy: snapshot.is_buy,
            order_type: snapshot.order_type,
            tif: TimeInForce::Gtc,
            limit_price_micros: snapshot.limit_price_micros,
            stop_price_micros: snapshot.stop_price_micros,
            bracket_legs: Vec::new(),
        };
        self.broker.submit_order(request).await
    }

    /// §4.2 `execute_stop_update`.
    pub async fn execute_stop_update(&self, symbol: &str, new_stop_micros: i64) -> SequenceResult {
        let sequence_id = Self::new_sequence_id();
        let started = Instant::now();
        let mut operations = Vec::new();

        let (_guard, contended) = match self.enforce_gates_and_lock(&sequence_id, symbol).await {
            Ok(v) => v,
            Err(refused) => return refused,
        };

        let open_orders = self.broker.list_orders(Some(symbol)).await.unwrap_or_default();
        let open_orders: Vec<Order> = open_orders.into_iter().filter(|o| !o.status.is_terminal()).collect();
        let position = self.broker.get_position(symbol).await.ok().flatten();
        let position_side = match &position {
            Some(p) if p.qty < 0 => Side::Short,
            _ => Side::Long,
        };

        let conflicts = detect_conflicts(
            SequenceOp::StopUpdate { new_stop_micros },
            &open_orders,
            position.as_ref().map(|p| p.qty),
            position_side,
            contended,
        );

        if conflicts.contains(&OrderConflict::InsufficientShares) || conflicts.contains(&OrderConflict::InvalidPrice) {
            return SequenceResult {
                success: false,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: conflicts,
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "aborted: unresolved blocker in detect_conflicts".to_string(),
            };
        }

        let mut working_orders = open_orders;
        if conflicts.contains(&OrderConflict::DuplicateOrder) {
            let duplicates: Vec<Order> = working_orders
                .iter()
                .filter(|o| o.order_type == OrderType::Stop)
                .cloned()
                .collect();
            for dup in &duplicates {
                let _ = self.broker.cancel_order(&dup.order_id).await;
            }
            operations.push("cancel_duplicate_stops".to_string());
            working_orders.retain(|o| o.order_type != OrderType::Stop);
        }

        let existing_stop = working_orders.iter().find(|o| o.order_type == OrderType::Stop).cloned();
        let mut canceled_snapshot = None;

        if let Some(stop) = &existing_stop {
            let snapshot = CanceledOrderSnapshot::from_order(stop);
            let order_id = stop.order_id.clone();
            let cancel_result = retry_with_backoff(self.sleeper.as_ref(), self.config.cancel_max_retries, || {
                let broker = &self.broker;
                let order_id = order_id.clone();
                async move { broker.cancel_order(&order_id).await }
            })
            .await;

            if cancel_result.is_err() {
                return SequenceResult {
                    success: false,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: vec![OrderConflict::BrokerRejection],
                    rollback_performed: false,
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "aborted: cancel of existing stop failed after retries".to_string(),
                };
            }
            operations.push("cancel_existing_stop".to_string());

            let canceled = self
                .poll_until(&order_id, self.config.cancel_timeout, |o| {
                    matches!(o.status, OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected)
                })
                .await;
            if canceled.is_none() {
                return SequenceResult {
                    success: false,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: Vec::new(),
                    rollback_performed: false,
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "aborted: existing stop cancel did not confirm within timeout".to_string(),
                };
            }
            canceled_snapshot = Some(snapshot);
        }

        let position = self.broker.get_position(symbol).await.ok().flatten();
        let position_qty = match position {
            Some(p) if p.qty != 0 => p.qty,
            _ => {
                return SequenceResult {
                    success: false,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: vec![OrderConflict::InsufficientShares],
                    rollback_performed: false,
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "aborted: no open position to re-stop".to_string(),
                };
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        let request = self.stop_order_request(symbol, position_qty, new_stop_micros, now_ms);
        let submitted = self.broker.submit_order(request).await;

        let new_order = match submitted {
            Ok(order) => order,
            Err(_) => return self.rollback_stop(sequence_id, symbol, operations, canceled_snapshot, started).await,
        };
        operations.push("submit_new_stop".to_string());

        let active = self
            .poll_until(&new_order.order_id, self.config.new_order_active_timeout, |o| {
                o.status.is_active() || o.status == OrderStatus::Rejected
            })
            .await;

        match active {
            Some(order) if order.status != OrderStatus::Rejected => SequenceResult {
                success: true,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: conflicts,
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "stop updated".to_string(),
            },
            _ => self.rollback_stop(sequence_id, symbol, operations, canceled_snapshot, started).await,
        }
    }

    async fn rollback_stop(
        &self,
        sequence_id: String,
        symbol: &str,
        mut operations: Vec<String>,
        canceled_snapshot: Option<CanceledOrderSnapshot>,
        started: Instant,
    ) -> SequenceResult {
        let Some(snapshot) = canceled_snapshot else {
            return SequenceResult {
                success: false,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: Vec::new(),
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "failed: no prior stop to roll back to".to_string(),
            };
        };

        let now_ms = Utc::now().timestamp_millis();
        let resubmitted = self.resubmit_snapshot(symbol, &snapshot, now_ms).await;
        match resubmitted {
            Ok(order) => {
                let confirmed = self
                    .poll_until(&order.order_id, self.config.new_order_active_timeout, |o| {
                        o.status.is_active() || o.status.is_terminal()
                    })
                    .await;
                operations.push("rollback_resubmit_prior_stop".to_string());
                SequenceResult {
                    success: false,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: Vec::new(),
                    rollback_performed: confirmed.is_some(),
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "rolled back: restored prior stop after sequence failure".to_string(),
                }
            }
            Err(_) => SequenceResult {
                success: false,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: vec![OrderConflict::BrokerRejection],
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "failed: rollback resubmission of prior stop also failed".to_string(),
            },
        }
    }

    /// §4.2 `execute_partial_exit_with_stop_update`.
    pub async fn execute_partial_exit_with_stop_update(
        &self,
        symbol: &str,
        exit_qty: i64,
        new_stop_micros: i64,
    ) -> PartialExitOutcome {
        let sequence_id = Self::new_sequence_id();
        let started = Instant::now();
        let mut operations = Vec::new();

        let (_guard, contended) = match self.enforce_gates_and_lock(&sequence_id, symbol).await {
            Ok(v) => v,
            Err(refused) => return PartialExitOutcome::unfilled(refused),
        };

        let open_orders = self.broker.list_orders(Some(symbol)).await.unwrap_or_default();
        let open_orders: Vec<Order> = open_orders.into_iter().filter(|o| !o.status.is_terminal()).collect();
        let position = self.broker.get_position(symbol).await.ok().flatten();
        let position_side = match &position {
            Some(p) if p.qty < 0 => Side::Short,
            _ => Side::Long,
        };

        let conflicts = detect_conflicts(
            SequenceOp::PartialExit { exit_qty, new_stop_micros },
            &open_orders,
            position.as_ref().map(|p| p.qty),
            position_side,
            contended,
        );

        if conflicts.contains(&OrderConflict::InsufficientShares) || conflicts.contains(&OrderConflict::InvalidPrice) {
            return PartialExitOutcome::unfilled(SequenceResult {
                success: false,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: conflicts,
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "aborted: unresolved blocker in detect_conflicts".to_string(),
            });
        }

        // Step 1: snapshot pre-state for rollback.
        let exit_leg_orders: Vec<Order> = open_orders
            .iter()
            .filter(|o| {
                let closes = match position_side {
                    Side::Long => !o.is_buy,
                    Side::Short => o.is_buy,
                };
                closes && matches!(o.order_type, OrderType::Stop | OrderType::Limit | OrderType::TrailingStop)
            })
            .cloned()
            .collect();
        let snapshots: Vec<CanceledOrderSnapshot> = exit_leg_orders.iter().map(CanceledOrderSnapshot::from_order).collect();

        // Step 2: cancel all existing sell-side exit orders, wait for cancellation.
        for order in &exit_leg_orders {
            let _ = self.broker.cancel_order(&order.order_id).await;
        }
        for order in &exit_leg_orders {
            self.poll_until(&order.order_id, self.config.cancel_timeout, |o| o.status.is_terminal()).await;
        }
        if !exit_leg_orders.is_empty() {
            operations.push("cancel_existing_exit_legs".to_string());
        }

        // Step 3: submit day market order for exit_qty.
        let is_buy = position_side == Side::Short;
        let now_ms = Utc::now().timestamp_millis();
        let coid = client_order_id(symbol, position_side, exit_qty, 0, tcx_core::idempotency::floor_to_minute_ms(now_ms));
        let exit_request = SubmitOrderRequest {
            client_order_id: coid,
            symbol: symbol.to_string(),
            qty: exit_qty,
            side: position_side,
            is_buy,
            order_type: OrderType::Market,
            tif: TimeInForce::Day,
            limit_price_micros: None,
            stop_price_micros: None,
            bracket_legs: Vec::new(),
        };
        let exit_order = match self.broker.submit_order(exit_request).await {
            Ok(order) => order,
            Err(_) => {
                let result = self.rollback_exit_legs(sequence_id, symbol, operations, &snapshots, started).await;
                return PartialExitOutcome::unfilled(result);
            }
        };
        operations.push("submit_partial_exit_market_order".to_string());

        // Step 4: wait for fill (<=5s); rollback on timeout or non-filled terminal status.
        let monitor = FillMonitor::with_config(
            self.broker.clone(),
            self.sleeper.clone(),
            MonitorConfig { default_deadline: self.config.partial_exit_fill_timeout, ..MonitorConfig::default() },
        );
        let fill = monitor.watch_default(&exit_order.order_id, symbol).await;
        if !fill.filled {
            let result = self.rollback_exit_legs(sequence_id, symbol, operations, &snapshots, started).await;
            return PartialExitOutcome::unfilled(result);
        }
        operations.push("confirm_partial_exit_fill".to_string());
        let fill_price_micros = fill.fill_price_micros;
        let fill_quantity = fill.fill_quantity;

        // Step 5: re-read position; if shares remain, submit a new stop for the remainder.
        let position = self.broker.get_position(symbol).await.ok().flatten();
        let remaining_qty = position.map(|p| p.qty).unwrap_or(0);
        if remaining_qty == 0 {
            return PartialExitOutcome {
                result: SequenceResult {
                    success: true,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: conflicts,
                    rollback_performed: false,
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "partial exit filled, position fully closed".to_string(),
                },
                fill_price_micros,
                fill_quantity,
            };
        }

        let request = self.stop_order_request(symbol, remaining_qty, new_stop_micros, now_ms);
        let new_stop = match self.broker.submit_order(request).await {
            Ok(order) => order,
            Err(_) => {
                return PartialExitOutcome {
                    result: SequenceResult {
                        success: false,
                        sequence_id,
                        operations_completed: operations,
                        conflicts_detected: vec![OrderConflict::BrokerRejection],
                        rollback_performed: false,
                        execution_time_ms: started.elapsed().as_millis() as i64,
                        message: "partial exit filled but re-stop of remainder failed to submit".to_string(),
                    },
                    fill_price_micros,
                    fill_quantity,
                }
            }
        };
        let active = self
            .poll_until(&new_stop.order_id, self.config.new_order_active_timeout, |o| {
                o.status.is_active() || o.status == OrderStatus::Rejected
            })
            .await;
        operations.push("submit_remainder_stop".to_string());

        PartialExitOutcome {
            result: SequenceResult {
                success: active.map(|o| o.status != OrderStatus::Rejected).unwrap_or(false),
                sequence_id,
                operations_completed: operations,
                conflicts_detected: conflicts,
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "partial exit filled, remainder re-stopped".to_string(),
            },
            fill_price_micros,
            fill_quantity,
        }
    }

    async fn rollback_exit_legs(
        &self,
        sequence_id: String,
        symbol: &str,
        mut operations: Vec<String>,
        snapshots: &[CanceledOrderSnapshot],
        started: Instant,
    ) -> SequenceResult {
        if snapshots.is_empty() {
            return SequenceResult {
                success: false,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: Vec::new(),
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "failed: partial exit did not fill and there were no prior exit legs to restore".to_string(),
            };
        }

        let now_ms = Utc::now().timestamp_millis();
        let mut all_restored = true;
        for snapshot in snapshots {
            match self.resubmit_snapshot(symbol, snapshot, now_ms).await {
                Ok(order) => {
                    let confirmed = self
                        .poll_until(&order.order_id, self.config.new_order_active_timeout, |o| {
                            o.status.is_active() || o.status.is_terminal()
                        })
                        .await;
                    all_restored &= confirmed.is_some();
                }
                Err(_) => all_restored = false,
            }
        }
        operations.push("rollback_recreate_exit_legs".to_string());

        SequenceResult {
            success: false,
            sequence_id,
            operations_completed: operations,
            conflicts_detected: Vec::new(),
            rollback_performed: all_restored,
            execution_time_ms: started.elapsed().as_millis() as i64,
            message: "rolled back: recreated exit legs after partial exit failed to fill".to_string(),
        }
    }

    /// §4.5.6 bracket entry submission. The parent order carries the stop
    /// and target as `bracket_legs`; the parent is watched by C3 here so
    /// the caller (C5) gets back the realized fill, not just an
    /// acknowledgement. This never rolls back a prior position — there is
    /// none yet — it only cancels the parent if it never fills.
    pub async fn execute_entry(&self, request: SubmitOrderRequest) -> EntryOutcome {
        let sequence_id = Self::new_sequence_id();
        let started = Instant::now();
        let symbol = request.symbol.clone();
        let mut operations = Vec::new();

        let (_guard, contended) = match self.enforce_gates_and_lock(&sequence_id, &symbol).await {
            Ok(v) => v,
            Err(refused) => return EntryOutcome { result: refused, order: None },
        };

        if contended {
            return EntryOutcome {
                result: SequenceResult {
                    success: false,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: vec![OrderConflict::ConcurrentModification],
                    rollback_performed: false,
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "aborted: symbol already has an in-flight sequence".to_string(),
                },
                order: None,
            };
        }

        let submitted = match self.broker.submit_order(request).await {
            Ok(order) => order,
            Err(err) => {
                return EntryOutcome {
                    result: SequenceResult {
                        success: false,
                        sequence_id,
                        operations_completed: operations,
                        conflicts_detected: vec![OrderConflict::BrokerRejection],
                        rollback_performed: false,
                        execution_time_ms: started.elapsed().as_millis() as i64,
                        message: format!("entry submission rejected: {err}"),
                    },
                    order: None,
                }
            }
        };
        operations.push("submit_entry".to_string());

        let monitor = FillMonitor::with_config(
            self.broker.clone(),
            self.sleeper.clone(),
            MonitorConfig { default_deadline: self.config.entry_fill_timeout, ..MonitorConfig::default() },
        );
        let fill = monitor.watch_default(&submitted.order_id, &symbol).await;

        if !fill.filled {
            let _ = self.broker.cancel_order(&submitted.order_id).await;
            operations.push("cancel_unfilled_entry".to_string());
            return EntryOutcome {
                result: SequenceResult {
                    success: false,
                    sequence_id,
                    operations_completed: operations,
                    conflicts_detected: Vec::new(),
                    rollback_performed: false,
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    message: "entry did not fill within the monitoring deadline".to_string(),
                },
                order: None,
            };
        }
        operations.push("confirm_entry_fill".to_string());

        let filled_order = self.broker.get_order(&submitted.order_id).await.unwrap_or(submitted);
        EntryOutcome {
            result: SequenceResult {
                success: true,
                sequence_id,
                operations_completed: operations,
                conflicts_detected: Vec::new(),
                rollback_performed: false,
                execution_time_ms: started.elapsed().as_millis() as i64,
                message: "entry filled".to_string(),
            },
            order: Some(filled_order),
        }
    }
}
