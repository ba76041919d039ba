//! §4.5.5 adaptive sizing: confidence ladder, session multiplier,
//! equity/buying-power/max-position caps, slippage-adjusted expected fill,
//! and R/R-widened target. All money fields are `i64` micros.

use tcx_core::Side;

use crate::filters::Session;

#[derive(Clone, Copy, Debug)]
pub struct SizingConfig {
    /// §4.5.5: "e.g. 1%" risk-per-trade base, before the confidence ladder.
    pub base_risk_pct: f64,
    /// Hard ceiling on the confidence-adjusted risk percentage ("never >2%").
    pub max_risk_pct: f64,
    pub max_position_pct: f64,
    /// §4.5.5 "0.3% slippage buffer in the direction of trade".
    pub slippage_pct: f64,
    pub k_stop_atr: f64,
    pub k_target_atr: f64,
    pub min_rr: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_risk_pct: 0.01,
            max_risk_pct: 0.02,
            max_position_pct: 0.20,
            slippage_pct: 0.003,
            k_stop_atr: 1.5,
            k_target_atr: 3.0,
            min_rr: 2.0,
        }
    }
}

/// §4.5.5 confidence ladder: 70->1.0x, 75->1.2x, 80->1.5x, 85->1.8x, 90+->2.0x.
fn confidence_multiplier(confidence: f64) -> f64 {
    if confidence >= 90.0 {
        2.0
    } else if confidence >= 85.0 {
        1.8
    } else if confidence >= 80.0 {
        1.5
    } else if confidence >= 75.0 {
        1.2
    } else {
        1.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SizedEntry {
    pub qty: i64,
    pub expected_fill_price_micros: i64,
    pub stop_price_micros: i64,
    pub target_price_micros: i64,
}

/// Returns `None` only when the computed share count rounds to zero (the
/// caller should treat that as "do not submit", not an error).
#[allow(clippy::too_many_arguments)]
pub fn size_entry(
    config: &SizingConfig,
    side: Side,
    confidence: f64,
    session: Session,
    equity_micros: i64,
    buying_power_micros: i64,
    real_time_price_micros: i64,
    atr_micros: i64,
) -> Option<SizedEntry> {
    let risk_pct = (config.base_risk_pct * confidence_multiplier(confidence) * session.size_multiplier())
        .min(config.max_risk_pct);

    let slippage_direction = match side {
        Side::Long => 1.0,
        Side::Short => -1.0,
    };
    let expected_fill_price_micros =
        (real_time_price_micros as f64 * (1.0 + slippage_direction * config.slippage_pct)) as i64;

    let stop_distance_micros = (atr_micros as f64 * config.k_stop_atr) as i64;
    let mut target_distance_micros = (atr_micros as f64 * config.k_target_atr) as i64;
    if stop_distance_micros > 0 {
        let implied_rr = target_distance_micros as f64 / stop_distance_micros as f64;
        if implied_rr < config.min_rr {
            target_distance_micros = (stop_distance_micros as f64 * config.min_rr) as i64;
        }
    }

    let (stop_price_micros, target_price_micros) = match side {
        Side::Long => (
            expected_fill_price_micros - stop_distance_micros,
            expected_fill_price_micros + target_distance_micros,
        ),
        Side::Short => (
            expected_fill_price_micros + stop_distance_micros,
            expected_fill_price_micros - target_distance_micros,
        ),
    };

    if stop_distance_micros <= 0 {
        return None;
    }

    let risk_budget_micros = (equity_micros as f64 * risk_pct) as i64;
    let qty_by_risk = risk_budget_micros / stop_distance_micros;

    let max_position_value_micros = (equity_micros as f64 * config.max_position_pct) as i64;
    let qty_by_position_cap = if expected_fill_price_micros > 0 {
        max_position_value_micros / expected_fill_price_micros
    } else {
        0
    };
    let qty_by_buying_power = if expected_fill_price_micros > 0 {
        buying_power_micros / expected_fill_price_micros
    } else {
        0
    };

    let qty = qty_by_risk.min(qty_by_position_cap).min(qty_by_buying_power);

    (qty > 0).then_some(SizedEntry { qty, expected_fill_price_micros, stop_price_micros, target_price_micros })
}
