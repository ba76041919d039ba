//! §4.5.2 signal construction: raw direction from the EMA relationship,
//! plus a weighted confirmation score across RSI zone, MACD histogram
//! sign, ADX strength, and volume ratio. Pure function of [`Features`] —
//! no indicator math lives here, only the scoring of values the feature
//! engine already computed.

use tcx_core::market::Features;
use tcx_core::Side;

/// Raw direction implied by the EMA(short)/EMA(long) relationship, before
/// any confirmation scoring or admission filtering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
    None,
}

impl Direction {
    pub fn side(self) -> Option<Side> {
        match self {
            Direction::Buy => Some(Side::Long),
            Direction::Sell => Some(Side::Short),
            Direction::None => None,
        }
    }
}

/// A fully-scored signal (§3 "raw direction... confirmation count...
/// confidence").
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub direction: Direction,
    /// Out of four: RSI zone, MACD histogram sign, ADX strength, volume ratio.
    pub confirmations: u8,
    /// In `[0, 100]`.
    pub confidence: f64,
}

const RSI_BUY_FLOOR: f64 = 50.0;
const RSI_BUY_CEIL: f64 = 70.0;
const RSI_SELL_FLOOR: f64 = 30.0;
const RSI_SELL_CEIL: f64 = 50.0;
const ADX_TREND_FLOOR: f64 = 20.0;
const VOLUME_RATIO_CONFIRM_FLOOR: f64 = 1.0;

/// §4.5.2. EMA relationship decides direction; each of the four
/// confirmation checks contributes independently to both the count and a
/// weighted confidence score.
pub fn build_signal(features: &Features) -> Signal {
    let direction = if features.ema_short_micros > features.ema_long_micros {
        Direction::Buy
    } else if features.ema_short_micros < features.ema_long_micros {
        Direction::Sell
    } else {
        Direction::None
    };

    if direction == Direction::None {
        return Signal { direction, confirmations: 0, confidence: 0.0 };
    }

    let mut confirmations = 0u8;
    let mut weighted = 0.0;

    // RSI zone: confirms a buy in [50, 70], a sell in [30, 50].
    let rsi_confirms = match direction {
        Direction::Buy => features.rsi >= RSI_BUY_FLOOR && features.rsi <= RSI_BUY_CEIL,
        Direction::Sell => features.rsi >= RSI_SELL_FLOOR && features.rsi <= RSI_SELL_CEIL,
        Direction::None => false,
    };
    if rsi_confirms {
        confirmations += 1;
        weighted += 25.0;
    }

    // MACD histogram sign: macd above its signal line confirms a buy.
    let macd_hist = features.macd - features.macd_signal;
    let macd_confirms = match direction {
        Direction::Buy => macd_hist > 0.0,
        Direction::Sell => macd_hist < 0.0,
        Direction::None => false,
    };
    if macd_confirms {
        confirmations += 1;
        weighted += 25.0;
    }

    // ADX strength: a trending market confirms either direction.
    if features.adx >= ADX_TREND_FLOOR {
        confirmations += 1;
        weighted += 25.0 * (features.adx / 100.0).min(1.0).max(0.25);
    }

    // Volume ratio: above-average participation confirms either direction.
    if features.volume_ratio >= VOLUME_RATIO_CONFIRM_FLOOR {
        confirmations += 1;
        weighted += 25.0 * features.volume_ratio.min(2.0) / 2.0;
    }

    let confidence = (weighted * features.regime_multiplier.max(0.1)).min(100.0);

    Signal { direction, confirmations, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tcx_core::market::MarketRegime;

    fn base_features() -> Features {
        Features {
            symbol: "AAPL".to_string(),
            price_micros: 100_000_000,
            ema_short_micros: 101_000_000,
            ema_long_micros: 100_000_000,
            rsi: 60.0,
            macd: 1.0,
            macd_signal: 0.5,
            adx: 30.0,
            atr_micros: 1_000_000,
            volume: 1_000.0,
            volume_avg: 800.0,
            volume_ratio: 1.25,
            regime: MarketRegime::Trending,
            regime_multiplier: 1.0,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn strong_uptrend_confirms_on_all_four() {
        let signal = build_signal(&base_features());
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.confirmations, 4);
        assert!(signal.confidence > 80.0);
    }

    #[test]
    fn equal_emas_yield_no_direction() {
        let mut features = base_features();
        features.ema_short_micros = features.ema_long_micros;
        let signal = build_signal(&features);
        assert_eq!(signal.direction, Direction::None);
        assert_eq!(signal.confirmations, 0);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn downtrend_with_sell_zone_rsi_confirms_sell() {
        let mut features = base_features();
        features.ema_short_micros = 99_000_000;
        features.ema_long_micros = 100_000_000;
        features.rsi = 40.0;
        features.macd = -1.0;
        features.macd_signal = -0.2;
        let signal = build_signal(&features);
        assert_eq!(signal.direction, Direction::Sell);
        assert!(signal.confirmations >= 3);
    }

    #[test]
    fn low_regime_multiplier_caps_confidence() {
        let mut features = base_features();
        features.regime_multiplier = 0.2;
        let signal = build_signal(&features);
        assert!(signal.confidence < 30.0);
    }
}
