//! §4.4.3 auxiliary exit signals: bearish RSI divergence and ADX collapse.
//! Both are pure functions over feature-engine output; neither computes an
//! indicator — the last price/RSI history and the current ADX reading are
//! supplied by [`tcx_core::FeatureSource`].

use tcx_core::ProtectionState;

/// Bearish RSI divergence over the last 5 bars: price makes a higher high
/// while RSI makes a lower high. `samples` is `(price_micros, rsi)`, oldest
/// first; only the most recent 5 are considered (earlier entries, if any,
/// are ignored).
pub fn bearish_rsi_divergence(samples: &[(i64, f64)]) -> bool {
    let window = if samples.len() > 5 { &samples[samples.len() - 5..] } else { samples };
    if window.len() < 5 {
        return false;
    }
    let (last_price, last_rsi) = *window.last().unwrap();
    let prior = &window[..window.len() - 1];
    let prior_max_price = prior.iter().map(|(p, _)| *p).max().unwrap();
    let prior_max_rsi = prior.iter().map(|(_, r)| *r).fold(f64::MIN, f64::max);

    last_price > prior_max_price && last_rsi < prior_max_rsi
}

/// ADX falling below 20 while the position has already reached a profit
/// milestone (at least one partial exit has fired) — §4.4.3 "ADX falling
/// below 20 while in a profit milestone state".
pub fn adx_collapse_in_profit(protection_state: ProtectionState, adx: f64) -> bool {
    protection_state.index() >= ProtectionState::PartialProfitTaken.index() && adx < 20.0
}
