//! Profit Protection Manager (C4).
//!
//! A periodic tick loop that drives C1 from live prices and routes every
//! stop update or partial exit through C2 (§4.4 [ADDED] "Routing through
//! C2" — this manager never writes a broker order directly and never
//! mutates C1 directly; it only reads back what C2/C1 have already
//! confirmed).

pub mod exit_signals;
pub mod partial_exit;
pub mod trailing_stop;

pub use exit_signals::{adx_collapse_in_profit, bearish_rsi_divergence};
pub use partial_exit::{required_partial_exit, PartialExitMilestone, PartialExitSchedule};
pub use trailing_stop::required_stop_update;

use std::sync::Arc;
use std::time::Duration;

use tcx_core::broker::BrokerAdapter;
use tcx_core::{FeatureSource, Side};
use tcx_position::PositionTracker;
use tcx_sequencer::OrderSequencer;

/// Tunables for the tick loop (§4.4).
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// §4.4: the tick loop runs at roughly 1 Hz.
    pub tick_interval: Duration,
    pub partial_exit_schedule: PartialExitSchedule,
    /// ADX reading below which §4.4.3's collapse signal fires.
    pub adx_collapse_threshold: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            partial_exit_schedule: PartialExitSchedule::default(),
            adx_collapse_threshold: 20.0,
        }
    }
}

/// The Profit Protection Manager (C4).
pub struct ProtectionManager<B: BrokerAdapter> {
    positions: Arc<PositionTracker>,
    sequencer: Arc<OrderSequencer<B>>,
    features: Arc<dyn FeatureSource>,
    config: ManagerConfig,
}

impl<B: BrokerAdapter + 'static> ProtectionManager<B> {
    pub fn new(
        positions: Arc<PositionTracker>,
        sequencer: Arc<OrderSequencer<B>>,
        features: Arc<dyn FeatureSource>,
    ) -> Self {
        Self::with_config(positions, sequencer, features, ManagerConfig::default())
    }

    pub fn with_config(
        positions: Arc<PositionTracker>,
        sequencer: Arc<OrderSequencer<B>>,
        features: Arc<dyn FeatureSource>,
        config: ManagerConfig,
    ) -> Self {
        Self { positions, sequencer, features, config }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// §4.4.4 sync on startup: seed C1 from the broker's current open
    /// positions before the tick loop or C2 are allowed to touch anything
    /// for these symbols. This is the only place C4 calls the broker
    /// directly (§4.4 [ADDED] "Price source for C4's tick").
    pub async fn sync_existing_positions(&self, broker: &B) -> anyhow::Result<usize> {
        let broker_positions = broker.list_positions().await?;
        let mut synced = 0usize;
        for bp in broker_positions {
            if self.positions.get(&bp.symbol).is_some() {
                continue;
            }
            let side = if bp.qty >= 0 { Side::Long } else { Side::Short };
            // No broker-reported stop exists at this layer; seed the stop at
            // the entry price so R starts at zero rather than guessing a
            // risk distance the broker does not expose on a position.
            match self.positions.track(&bp.symbol, bp.avg_entry_price_micros, bp.avg_entry_price_micros, bp.qty.abs(), side) {
                Ok(_) => {
                    synced += 1;
                    tracing::info!(symbol = %bp.symbol, qty = bp.qty, "synced existing broker position into C1");
                }
                Err(err) => {
                    tracing::warn!(symbol = %bp.symbol, error = %err, "failed to sync existing broker position");
                }
            }
        }
        Ok(synced)
    }

    /// One full pass over every tracked symbol (§4.4 tick loop).
    pub async fn tick(&self) {
        for symbol in self.positions.symbols() {
            self.tick_symbol(&symbol).await;
        }
    }

    async fn tick_symbol(&self, symbol: &str) {
        let Some(features) = self.features.get_latest_features(symbol) else {
            return;
        };

        // Step 1: refresh price into C1. A symbol that has since been fully
        // exited (no longer tracked) yields `None` here — a silent no-op,
        // not an error (§5).
        let Some(position) = self.positions.update_price(symbol, features.price_micros) else {
            return;
        };

        // Step 2: auxiliary exit signals (§4.4.3) trigger a full-position
        // exit through C2, not just a log line — either signal preempts the
        // trailing-stop/partial-exit logic below for this tick.
        let rsi_samples = self.features.recent_price_rsi(symbol, 5);
        let rsi_divergence = bearish_rsi_divergence(&rsi_samples);
        let adx_collapse = adx_collapse_in_profit(position.protection_state, features.adx)
            && features.adx < self.config.adx_collapse_threshold;
        if rsi_divergence || adx_collapse {
            tracing::warn!(
                symbol,
                rsi_divergence,
                adx_collapse,
                adx = features.adx,
                "auxiliary exit signal fired, flattening position through C2"
            );
            self.exit_position_fully(symbol, &position).await;
            return;
        }

        let partial_exits_fired = position.share_allocation.partial_exits.len();
        let candidate_stop = required_stop_update(
            position.side,
            position.entry_price_micros,
            position.initial_risk_micros(),
            position.r_multiple_milli,
            position.stop_loss_micros,
        );

        // Step 3: a due partial exit takes priority — it carries its own
        // stop update to the post-exit level in the same C2 sequence
        // (§4.4 step 3).
        if let Some(qty) = required_partial_exit(
            &self.config.partial_exit_schedule,
            position.r_multiple_milli,
            position.original_quantity,
            partial_exits_fired,
            position.share_allocation.remaining_quantity,
        ) {
            let new_stop = candidate_stop.unwrap_or(position.stop_loss_micros);
            let outcome = self
                .sequencer
                .execute_partial_exit_with_stop_update(symbol, qty, new_stop)
                .await;
            if !outcome.result.success {
                tracing::warn!(
                    symbol,
                    sequence_id = %outcome.result.sequence_id,
                    message = %outcome.result.message,
                    "partial exit sequence did not succeed"
                );
                return;
            }
            self.reconcile_partial_exit(symbol, &position, qty, new_stop, &outcome);
            return;
        }

        // Step 4: otherwise, a lone trailing-stop advance.
        if let Some(new_stop) = candidate_stop {
            let result = self.sequencer.execute_stop_update(symbol, new_stop).await;
            if !result.success {
                tracing::warn!(
                    symbol,
                    sequence_id = %result.sequence_id,
                    message = %result.message,
                    "stop update sequence did not succeed"
                );
                return;
            }
            if !self.positions.update_stop_loss(symbol, new_stop).unwrap_or(false) {
                tracing::warn!(symbol, new_stop, "C2 confirmed a stop update C1 rejected as non-monotonic");
            }
        }
    }

    /// Writes a confirmed C2 outcome back into C1 (§2 "C1 is the single
    /// source of truth ... all other components mutate it through narrow
    /// operations"): records the partial exit at its realized fill price,
    /// advances the stop if shares remain, and destroys tracking once
    /// `remaining_quantity` reaches zero (§3 Lifecycles).
    fn reconcile_partial_exit(
        &self,
        symbol: &str,
        position: &tcx_core::Position,
        requested_qty: i64,
        new_stop: i64,
        outcome: &tcx_sequencer::PartialExitOutcome,
    ) {
        let filled_qty = if outcome.fill_quantity > 0 { outcome.fill_quantity } else { requested_qty };
        let fill_price = outcome.fill_price_micros.unwrap_or(position.current_price_micros);
        let profit = partial_exit_profit_micros(position.side, position.entry_price_micros, fill_price, filled_qty);

        match self.positions.record_partial_exit(symbol, filled_qty, fill_price, profit) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(symbol, filled_qty, "C2 confirmed a partial exit C1 rejected as invalid");
                return;
            }
            Err(err) => {
                tracing::warn!(symbol, error = %err, "failed to reconcile partial exit into C1");
                return;
            }
        }

        let remaining = self.positions.get(symbol).map(|p| p.share_allocation.remaining_quantity).unwrap_or(0);
        if remaining == 0 {
            self.positions.remove(symbol);
            return;
        }

        if !self.positions.update_stop_loss(symbol, new_stop).unwrap_or(false) {
            tracing::warn!(symbol, new_stop, "C2 confirmed a post-exit stop C1 rejected as non-monotonic");
        }
    }

    /// §4.4.3: flattens a position through C2 by reusing the partial-exit
    /// sequence with `exit_qty` set to the full remaining size — step 5 of
    /// that sequence (§4.2) already skips re-stopping once the remainder is
    /// zero, so this is a full exit without a separate sequencer operation.
    async fn exit_position_fully(&self, symbol: &str, position: &tcx_core::Position) {
        let qty = position.share_allocation.remaining_quantity;
        if qty <= 0 {
            return;
        }
        let outcome = self
            .sequencer
            .execute_partial_exit_with_stop_update(symbol, qty, position.stop_loss_micros)
            .await;
        if !outcome.result.success {
            tracing::warn!(
                symbol,
                sequence_id = %outcome.result.sequence_id,
                message = %outcome.result.message,
                "full-position exit sequence did not succeed"
            );
            return;
        }
        self.reconcile_partial_exit(symbol, position, qty, position.stop_loss_micros, &outcome);
    }
}

/// §3 PartialExit.profit_amount for a realized exit at `fill_price_micros`.
fn partial_exit_profit_micros(side: Side, entry_price_micros: i64, fill_price_micros: i64, shares_sold: i64) -> i64 {
    match side {
        Side::Long => (fill_price_micros - entry_price_micros) * shares_sold,
        Side::Short => (entry_price_micros - fill_price_micros) * shares_sold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_tick_rate() {
        let cfg = ManagerConfig::default();
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
        assert_eq!(cfg.partial_exit_schedule, PartialExitSchedule::default());
    }
}
