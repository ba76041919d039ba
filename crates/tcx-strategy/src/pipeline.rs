//! The per-symbol evaluation pipeline (C5): pulls a feature tick, builds a
//! signal, runs it through the ordered admission filters and adaptive
//! threshold, sizes the entry, and submits a bracket order through C2
//! (§4.5.6). Every stage that can reject short-circuits before any broker
//! call is made.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use tcx_core::broker::BrokerAdapter;
use tcx_core::market::{FeatureSource, SentimentSnapshot};
use tcx_core::{client_order_id, idempotency::floor_to_minute_ms, BracketLeg, OrderType, SequenceResult, Side, SubmitOrderRequest, TimeInForce};
use tcx_position::PositionTracker;
use tcx_sequencer::{EntryOutcome, OrderSequencer};
use tokio::sync::watch;

use crate::cooldown::CooldownTracker;
use crate::filters::{evaluate_filters, trading_session, FilterContext, Rejection};
use crate::shadow::{spawn_shadow_observation, NullObserver, NullSink, ShadowObserver, ShadowSink};
use crate::signal::build_signal;
use crate::sizing::{size_entry, SizingConfig};
use crate::threshold::{adaptive_threshold, ThresholdConfig};

#[derive(Clone, Debug, PartialEq)]
pub enum EvaluationOutcome {
    NoFeatures,
    NoDirection,
    OutsideTradingWindow,
    GloballyPaused,
    Rejected(Rejection),
    AccountUnavailable,
    SizeRoundedToZero,
    EntrySubmitted(SequenceResult),
    EntryNotFilled(SequenceResult),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineConfig {
    pub threshold: ThresholdConfig,
    pub sizing: SizingConfig,
}

/// The Strategy & Entry Pipeline (C5).
pub struct StrategyPipeline<B: BrokerAdapter> {
    positions: Arc<PositionTracker>,
    sequencer: Arc<OrderSequencer<B>>,
    broker: Arc<B>,
    features: Arc<dyn FeatureSource>,
    sentiment: watch::Receiver<SentimentSnapshot>,
    cooldown: Arc<CooldownTracker>,
    observer: Arc<dyn ShadowObserver>,
    sink: Arc<dyn ShadowSink>,
    config: PipelineConfig,
}

impl<B: BrokerAdapter + 'static> StrategyPipeline<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        positions: Arc<PositionTracker>,
        sequencer: Arc<OrderSequencer<B>>,
        broker: Arc<B>,
        features: Arc<dyn FeatureSource>,
        sentiment: watch::Receiver<SentimentSnapshot>,
    ) -> Self {
        Self {
            positions,
            sequencer,
            broker,
            features,
            sentiment,
            cooldown: Arc::new(CooldownTracker::new()),
            observer: Arc::new(NullObserver),
            sink: Arc::new(NullSink),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_shadow_observer(mut self, observer: Arc<dyn ShadowObserver>, sink: Arc<dyn ShadowSink>) -> Self {
        self.observer = observer;
        self.sink = sink;
        self
    }

    /// One full pass for `symbol`: feature read through to a submitted (or
    /// rejected) bracket entry. `local_time`/`now` are supplied explicitly
    /// by the caller rather than read from the wall clock, so the ordered
    /// filter chain stays pure and testable.
    pub async fn evaluate_symbol(&self, symbol: &str, local_time: NaiveTime, now: DateTime<Utc>) -> EvaluationOutcome {
        let Some(features) = self.features.get_latest_features(symbol) else {
            return EvaluationOutcome::NoFeatures;
        };

        let has_open_position = self.positions.get(symbol).is_some();
        if has_open_position {
            return EvaluationOutcome::Rejected(Rejection::OpenPositionExists);
        }

        let Some(session) = trading_session(local_time) else {
            return EvaluationOutcome::OutsideTradingWindow;
        };

        let is_on_cooldown = self.cooldown.is_on_cooldown(symbol, now);

        let signal = build_signal(&features);
        let Some(side) = signal.direction.side() else {
            return EvaluationOutcome::NoDirection;
        };

        let sentiment = *self.sentiment.borrow();

        let Some(threshold) = adaptive_threshold(&self.config.threshold, signal.direction, features.regime, features.regime_multiplier, sentiment)
        else {
            return EvaluationOutcome::GloballyPaused;
        };

        let ctx = FilterContext {
            features: &features,
            signal: &signal,
            session,
            threshold,
            sentiment,
            has_open_position,
            is_on_cooldown,
            k_stop_atr: self.config.sizing.k_stop_atr,
            k_target_atr: self.config.sizing.k_target_atr,
        };
        if let Err(rejection) = evaluate_filters(&ctx) {
            return EvaluationOutcome::Rejected(rejection);
        }

        let account = match self.broker.get_account().await {
            Ok(account) => account,
            Err(_) => return EvaluationOutcome::AccountUnavailable,
        };

        let Some(sized) = size_entry(
            &self.config.sizing,
            side,
            signal.confidence,
            session,
            account.equity_micros,
            account.buying_power_micros,
            features.price_micros,
            features.atr_micros,
        ) else {
            return EvaluationOutcome::SizeRoundedToZero;
        };

        let is_buy = side == Side::Long;
        let minute = floor_to_minute_ms(now.timestamp_millis());
        let coid = client_order_id(symbol, side, sized.qty, sized.expected_fill_price_micros, minute);

        let stop_leg = BracketLeg {
            order_type: OrderType::Stop,
            stop_price_micros: Some(sized.stop_price_micros),
            limit_price_micros: None,
        };
        let target_leg = BracketLeg {
            order_type: OrderType::Limit,
            stop_price_micros: None,
            limit_price_micros: Some(sized.target_price_micros),
        };

        let request = SubmitOrderRequest {
            client_order_id: coid,
            symbol: symbol.to_string(),
            qty: sized.qty,
            side,
            is_buy,
            order_type: OrderType::Market,
            tif: TimeInForce::Day,
            limit_price_micros: None,
            stop_price_micros: None,
            bracket_legs: vec![stop_leg, target_leg],
        };

        self.cooldown.record_submission(symbol, now);

        let EntryOutcome { result, order } = self.sequencer.execute_entry(request).await;
        if !result.success {
            return EvaluationOutcome::EntryNotFilled(result);
        }

        // §4.5.6: the realized fill price, not the pre-slippage estimate,
        // becomes the Position's entry price; the bracket's legs are
        // already resting at the broker as the initial stop and target.
        if let Some(order) = &order {
            let realized_entry = order.filled_avg_price_micros.unwrap_or(sized.expected_fill_price_micros);
            if let Err(err) = self.positions.track(symbol, realized_entry, sized.stop_price_micros, sized.qty, side) {
                tracing::warn!(symbol, error = %err, "entry filled but position could not be tracked");
            }
        }

        // §4.5.7: fire-and-forget, never awaited, never consulted again.
        spawn_shadow_observation(self.observer.clone(), self.sink.clone(), symbol.to_string(), features, signal.confidence);

        EvaluationOutcome::EntrySubmitted(result)
    }
}
