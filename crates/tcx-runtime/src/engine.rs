//! Process-wide wiring for the five core components (§2 "process
//! topology"): owns the shared `Arc` state every task reads and mutates
//! through, the operator-facing Control API (§6), and the offline-queue
//! retry path for entries refused while a gate is closed (§5, §9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use chrono_tz::America::New_York;
use tcx_core::broker::BrokerAdapter;
use tcx_core::market::{FeatureSource, SentimentSnapshot, SentimentSource};
use tcx_core::{Order, Position, Side, SubmitOrderRequest, OrderType, TimeInForce};
use tcx_position::PositionTracker;
use tcx_protection::ProtectionManager;
use tcx_reconcile::gate as reconcile_gate;
use tcx_risk::CircuitBreakerRegistry;
use tcx_sequencer::gates::ReconcileFreshness;
use tcx_sequencer::OrderSequencer;
use tcx_strategy::pipeline::{EvaluationOutcome, StrategyPipeline};
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::offline_queue::OfflineQueue;
use crate::status::{compute_metrics, EngineMetrics, EngineStatus, StreamingSnapshot};

/// Polls the watch channel into a stable value C5's pure filter chain can
/// read synchronously (§4.5 [ADDED] "Sentiment caching").
pub fn spawn_sentiment_poller(
    source: Arc<dyn SentimentSource>,
    interval: Duration,
) -> watch::Receiver<SentimentSnapshot> {
    let initial = source.get_sentiment();
    let (tx, rx) = watch::channel(initial);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let snapshot = source.get_sentiment();
            if tx.send(snapshot).is_err() {
                return;
            }
        }
    });
    rx
}

/// The live trading control plane (§2 process topology), parameterized
/// over the broker adapter so the same wiring runs against
/// `tcx-broker-paper` in dev and `tcx-broker-alpaca` in production.
pub struct Engine<B: BrokerAdapter + 'static> {
    pub positions: Arc<PositionTracker>,
    pub sequencer: Arc<OrderSequencer<B>>,
    pub protection: Arc<ProtectionManager<B>>,
    pub pipeline: Arc<StrategyPipeline<B>>,
    pub broker: Arc<B>,
    pub breaker: Arc<CircuitBreakerRegistry>,
    pub reconcile: Arc<ReconcileFreshness>,
    /// Symbols re-queued for entry evaluation after being refused by a gate
    /// (§5 "offline queue accepts deferred ops").
    pub reentry_queue: Arc<OfflineQueue<String>>,
    trading_enabled: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    symbols: Arc<AsyncMutex<Vec<String>>>,
}

impl<B: BrokerAdapter + 'static> Engine<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<B>,
        features: Arc<dyn FeatureSource>,
        sentiment: watch::Receiver<SentimentSnapshot>,
        symbols: Vec<String>,
    ) -> Self {
        let positions = Arc::new(PositionTracker::new());
        let breaker = Arc::new(CircuitBreakerRegistry::default());
        let reconcile = Arc::new(ReconcileFreshness::new());
        let sequencer = Arc::new(OrderSequencer::new(broker.clone(), Arc::new(tcx_fill::TokioSleeper), breaker.clone(), reconcile.clone()));
        let protection = Arc::new(ProtectionManager::new(positions.clone(), sequencer.clone(), features.clone()));
        let pipeline = Arc::new(StrategyPipeline::new(positions.clone(), sequencer.clone(), broker.clone(), features, sentiment));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            positions,
            sequencer,
            protection,
            pipeline,
            broker,
            breaker,
            reconcile,
            reentry_queue: Arc::new(OfflineQueue::default()),
            // Fail-closed: trading stays off until an operator explicitly
            // enables it (normally after a successful `sync_state()` call).
            trading_enabled: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
            symbols: Arc::new(AsyncMutex::new(symbols)),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Control API (§6 [produced]). Refuses to arm until the reconcile
    /// gate has synced at least once (§4.2.1, §4.4.4) — mirrors C2's own
    /// gate-refusal shape so the HTTP layer can surface it the same way.
    pub fn enable_trading(&self) -> Result<(), &'static str> {
        if !self.reconcile.is_synced() {
            return Err("reconcile_synced");
        }
        self.trading_enabled.store(true, Ordering::SeqCst);
        tracing::info!("trading enabled");
        Ok(())
    }

    pub fn disable_trading(&self) {
        self.trading_enabled.store(false, Ordering::SeqCst);
        tracing::warn!("trading disabled");
    }

    pub fn is_trading_enabled(&self) -> bool {
        self.trading_enabled.load(Ordering::SeqCst)
    }

    fn recovery_mode(&self) -> bool {
        self.breaker.any_open(Utc::now().timestamp_millis())
    }

    pub fn get_engine_status(&self) -> EngineStatus {
        EngineStatus {
            trading_enabled: self.is_trading_enabled(),
            recovery_mode: self.recovery_mode(),
            tracked_positions: self.positions.get_all().len(),
            reconcile_synced: self.reconcile.is_synced(),
            offline_queue_len: self.reentry_queue.len(),
            offline_queue_dropped: self.reentry_queue.dropped_count(),
        }
    }

    pub fn get_positions(&self) -> Vec<Position> {
        self.positions.get_all()
    }

    pub fn get_position_summary(&self, symbol: &str) -> Option<Position> {
        self.positions.get(symbol)
    }

    pub async fn get_orders(&self) -> anyhow::Result<Vec<Order>> {
        Ok(self.broker.list_orders(None).await?)
    }

    pub fn get_metrics(&self) -> EngineMetrics {
        compute_metrics(&self.positions.get_all(), self.reentry_queue.len())
    }

    pub async fn snapshot(&self) -> anyhow::Result<StreamingSnapshot> {
        Ok(StreamingSnapshot {
            metrics: self.get_metrics(),
            positions: self.get_positions(),
            open_orders: self.get_orders().await?,
        })
    }

    /// §4.4.4 sync on startup: seeds C1 from the broker's open positions,
    /// then marks the reconcile-freshness gate synced so C2 admits
    /// sequences. Must run before the C4/C5 loops are spawned.
    pub async fn sync_state(&self) -> anyhow::Result<usize> {
        let synced = self.protection.sync_existing_positions(self.broker.as_ref()).await?;
        self.reconcile.mark_synced();
        Ok(synced)
    }

    /// Emergency full exit (§7 "Operator commands ... always succeed at
    /// the control-plane level even if downstream broker calls fail; they
    /// mark intent and the manager drains"). Bypasses C2's atomic
    /// sequencing deliberately — flatten is a best-effort override, not a
    /// protected mutation sequence — and reports per-symbol broker errors
    /// without aborting the rest of the sweep.
    pub async fn flatten_all(&self) -> Vec<(String, anyhow::Result<()>)> {
        self.disable_trading();
        let mut results = Vec::new();
        for position in self.positions.get_all() {
            let is_buy = position.side == Side::Short;
            let request = SubmitOrderRequest {
                client_order_id: format!("flatten-{}-{}", position.symbol, Utc::now().timestamp_millis()),
                symbol: position.symbol.clone(),
                qty: position.quantity,
                side: position.side,
                is_buy,
                order_type: OrderType::Market,
                tif: TimeInForce::Day,
                limit_price_micros: None,
                stop_price_micros: None,
                bracket_legs: Vec::new(),
            };
            let outcome = self.broker.submit_order(request).await.map(|_| ()).map_err(anyhow::Error::from);
            if outcome.is_err() {
                tracing::error!(symbol = %position.symbol, "flatten_all: broker submit failed, intent recorded anyway");
            }
            results.push((position.symbol, outcome));
        }
        results
    }

    /// Spawns the C4 protection tick loop (§4.4, §5 "independent
    /// tokio::spawn'd tasks"). Observes the shutdown flag only between
    /// ticks, never mid-tick.
    pub fn spawn_protection_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        let tick_interval = engine.protection.config().tick_interval;
        let mut shutdown = engine.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    return;
                }
                engine.protection.tick().await;
                tokio::select! {
                    _ = tokio::time::sleep(tick_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        })
    }

    /// Spawns one C5 evaluation task per watched symbol (§5 "an entry
    /// pipeline task per evaluated symbol").
    pub fn spawn_entry_loops(self: &Arc<Self>, eval_interval: Duration) -> Vec<tokio::task::JoinHandle<()>> {
        let engine = self.clone();
        let symbols = engine.symbols.clone();
        let mut handles = Vec::new();
        let symbols_snapshot = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async { symbols.lock().await.clone() })
        });
        for symbol in symbols_snapshot {
            let engine = engine.clone();
            let mut shutdown = engine.shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    if *shutdown.borrow() {
                        return;
                    }
                    if engine.is_trading_enabled() {
                        let now = Utc::now();
                        let local_time = local_exchange_time(now);
                        let outcome = engine.pipeline.evaluate_symbol(&symbol, local_time, now).await;
                        engine.note_evaluation_outcome(&symbol, &outcome);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(eval_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }));
        }
        handles
    }

    fn note_evaluation_outcome(&self, symbol: &str, outcome: &EvaluationOutcome) {
        if let EvaluationOutcome::EntryNotFilled(result) = outcome {
            let gate_refused = result
                .conflicts_detected
                .iter()
                .any(|c| matches!(c, tcx_core::OrderConflict::GateRefused { .. }));
            if gate_refused {
                tracing::warn!(symbol, "entry refused by gate, queued for re-evaluation");
                self.reentry_queue.push(symbol.to_string());
            }
        }
    }

    /// Retries every symbol queued by a prior gate refusal, once. Intended
    /// to be called on a slower interval than the main entry loops (e.g.
    /// after a circuit breaker's recovery window elapses).
    pub async fn drain_reentry_queue(self: &Arc<Self>) {
        for symbol in self.reentry_queue.drain() {
            if !self.is_trading_enabled() {
                self.reentry_queue.push(symbol);
                continue;
            }
            let now = Utc::now();
            let local_time = local_exchange_time(now);
            let outcome = self.pipeline.evaluate_symbol(&symbol, local_time, now).await;
            self.note_evaluation_outcome(&symbol, &outcome);
        }
    }

    /// Signals every spawned loop to stop at its next boundary (§5
    /// "Shutdown"). In-flight C2 sequences and C3 monitors are untouched —
    /// they always run their own timeout/rollback path to completion.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// §4.2.1's conflict-resolution policy, applied at reconcile time:
    /// wraps `tcx_reconcile`'s periodic drift tick so the runtime can
    /// decide whether to keep the reconcile-freshness gate open.
    pub fn apply_reconcile_tick(&self, action: reconcile_gate::DriftAction) {
        if action.requires_halt_and_disarm() {
            tracing::error!("reconcile drift detected, disarming reconcile-freshness gate");
            self.disable_trading();
        }
    }
}

fn local_exchange_time(now: chrono::DateTime<Utc>) -> NaiveTime {
    now.with_timezone(&New_York).time()
}
