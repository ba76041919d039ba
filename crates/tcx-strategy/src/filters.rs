//! §4.5.3 admission filters, applied in order and short-circuiting on the
//! first rejection. Each filter is a pure function over the evaluation's
//! already-gathered inputs — no filter performs I/O.

use chrono::NaiveTime;
use tcx_core::market::{Features, SentimentSnapshot};

use crate::signal::{Direction, Signal};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Session {
    Morning,
    Midday,
    Closing,
}

impl Session {
    /// §4.5.5: morning 1.0, midday 0.7, closing 0.5.
    pub fn size_multiplier(self) -> f64 {
        match self {
            Session::Morning => 1.0,
            Session::Midday => 0.7,
            Session::Closing => 0.5,
        }
    }
}

/// Reason an entry was rejected by an admission filter, in filter order.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    OpenPositionExists,
    OutsideTradingWindow,
    Cooldown,
    RewardRiskFloor { implied_rr: f64 },
    GloballyPaused,
    BelowConfidenceThreshold { confidence: f64, threshold: f64 },
    InsufficientConfirmations { confirmations: u8, required: u8 },
    ShortSentimentBullish,
    ShortSentimentFearfulLowConfidence,
    ShortSentimentCautiousLowConfirmations,
    ShortEmaNotBearishOrTooFarFromPrice,
    ShortVolumeFloor,
    ShortRsiOversold,
    BuyVolumeFloor,
}

const RR_FLOOR: f64 = 1.95;

/// §4.5.3 step 2. Exchange-local trading window and session tag.
pub fn trading_session(local_time: NaiveTime) -> Option<Session> {
    let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    let morning_end = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
    let midday_end = NaiveTime::from_hms_opt(14, 0, 0).unwrap();
    let close = NaiveTime::from_hms_opt(15, 30, 0).unwrap();

    if local_time < open || local_time > close {
        return None;
    }
    if local_time < morning_end {
        Some(Session::Morning)
    } else if local_time < midday_end {
        Some(Session::Midday)
    } else {
        Some(Session::Closing)
    }
}

/// §4.5.3 step 4. ATR-based stop/target distances and the implied R/R,
/// using the same `k_stop_atr`/`k_target_atr` the entry will actually be
/// sized with (§4.5.5) — not a fixed ratio, so a narrow `k_target_atr`
/// configuration can genuinely fail this floor (§8 Scenario 4).
pub fn reward_risk_ratio(atr_micros: i64, k_stop_atr: f64, k_target_atr: f64) -> f64 {
    let stop_distance = (atr_micros as f64) * k_stop_atr;
    if stop_distance <= 0.0 {
        return 0.0;
    }
    let target_distance = (atr_micros as f64) * k_target_atr;
    target_distance / stop_distance
}

/// Inputs a caller has already gathered once per evaluation, threaded
/// through the ordered filter chain so each filter stays a pure function.
pub struct FilterContext<'a> {
    pub features: &'a Features,
    pub signal: &'a Signal,
    pub session: Session,
    pub threshold: f64,
    pub sentiment: SentimentSnapshot,
    pub has_open_position: bool,
    pub is_on_cooldown: bool,
    /// §4.5.3 step 4 / §4.5.5: the ATR multiples this entry will actually be
    /// stopped and targeted at, so the R/R floor reflects the real trade.
    pub k_stop_atr: f64,
    pub k_target_atr: f64,
}

/// Runs all eight filters in §4.5.3 order, stopping at the first
/// rejection.
pub fn evaluate_filters(ctx: &FilterContext<'_>) -> Result<(), Rejection> {
    // 1. Open-position guard.
    if ctx.has_open_position {
        return Err(Rejection::OpenPositionExists);
    }

    // 2. Time-of-day window already resolved into `ctx.session` by the
    // caller (a `None` from `trading_session` means the caller never
    // builds a `FilterContext` at all, per §4.5.3's short-circuit wording).

    // 3. Per-symbol cooldown.
    if ctx.is_on_cooldown {
        return Err(Rejection::Cooldown);
    }

    // 4. R/R floor.
    let implied_rr = reward_risk_ratio(ctx.features.atr_micros, ctx.k_stop_atr, ctx.k_target_atr);
    if implied_rr < RR_FLOOR {
        return Err(Rejection::RewardRiskFloor { implied_rr });
    }

    // 5. Adaptive confidence threshold.
    if ctx.signal.confidence < ctx.threshold {
        return Err(Rejection::BelowConfidenceThreshold { confidence: ctx.signal.confidence, threshold: ctx.threshold });
    }

    // 6. Confirmation minimum: >=2 at confidence >=65, else >=3.
    let required = if ctx.signal.confidence >= 65.0 { 2 } else { 3 };
    if ctx.signal.confirmations < required {
        return Err(Rejection::InsufficientConfirmations { confirmations: ctx.signal.confirmations, required });
    }

    // 7. Short-specific filters.
    if ctx.signal.direction == Direction::Sell {
        let sentiment = ctx.sentiment.score;

        if sentiment > 55.0 {
            return Err(Rejection::ShortSentimentBullish);
        }
        if sentiment < 20.0 && ctx.signal.confidence < 65.0 {
            return Err(Rejection::ShortSentimentFearfulLowConfidence);
        }
        if sentiment < 35.0 && ctx.signal.confirmations < 3 {
            return Err(Rejection::ShortSentimentCautiousLowConfirmations);
        }

        let near_short_ema = {
            let distance = (ctx.features.price_micros - ctx.features.ema_short_micros).abs() as f64;
            let threshold = ctx.features.ema_short_micros as f64 * 0.005;
            distance <= threshold
        };
        if !(ctx.features.ema_short_micros < ctx.features.ema_long_micros && near_short_ema) {
            return Err(Rejection::ShortEmaNotBearishOrTooFarFromPrice);
        }

        let volume_floor = sentiment_scaled_volume_floor(sentiment, true);
        if ctx.features.volume_ratio < volume_floor {
            return Err(Rejection::ShortVolumeFloor);
        }

        if ctx.features.rsi < 30.0 {
            return Err(Rejection::ShortRsiOversold);
        }
    }

    // 8. Volume floor for buys.
    if ctx.signal.direction == Direction::Buy {
        let volume_floor = sentiment_scaled_volume_floor(ctx.sentiment.score, false);
        if ctx.features.volume_ratio < volume_floor {
            return Err(Rejection::BuyVolumeFloor);
        }
    }

    Ok(())
}

/// §4.5.3 steps 7e/8: a sentiment-scaled minimum volume ratio, "much
/// looser" for buys than for the short-side floor.
fn sentiment_scaled_volume_floor(sentiment_score: f64, is_short: bool) -> f64 {
    let fear = (50.0 - sentiment_score).max(0.0) / 50.0;
    if is_short {
        1.2 + fear * 0.6
    } else {
        0.8 + fear * 0.2
    }
}
