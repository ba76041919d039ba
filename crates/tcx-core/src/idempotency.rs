//! Deterministic client order IDs (§8 P7: "submitting the same logical
//! entry twice yields at most one broker order"). Hashing the same
//! (symbol, side, qty, price hint, minute) always produces the same id, so
//! a broker that rejects or de-dupes on `client_order_id` turns an
//! accidental double-submit into a no-op rather than a second position.

use sha2::{Digest, Sha256};

use crate::types::Side;

/// `minute_floor_unix_ms` should be the submission timestamp floored to the
/// start of its minute, so retries of the same logical order within the
/// same minute collide deterministically while a legitimately new order a
/// minute later gets a fresh id.
pub fn client_order_id(
    symbol: &str,
    side: Side,
    qty: i64,
    price_hint_micros: i64,
    minute_floor_unix_ms: i64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(side.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(qty.to_le_bytes());
    hasher.update(b"|");
    hasher.update(price_hint_micros.to_le_bytes());
    hasher.update(b"|");
    hasher.update(minute_floor_unix_ms.to_le_bytes());
    let digest = hasher.finalize();
    format!("tcx-{}", hex::encode(&digest[..16]))
}

/// Floors a unix millisecond timestamp to the start of its minute.
pub fn floor_to_minute_ms(unix_ms: i64) -> i64 {
    const MINUTE_MS: i64 = 60_000;
    unix_ms.div_euclid(MINUTE_MS) * MINUTE_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_minute_yield_same_id() {
        let a = client_order_id("AAPL", Side::Long, 100, 100_500_000, floor_to_minute_ms(1_700_000_030_000));
        let b = client_order_id("AAPL", Side::Long, 100, 100_500_000, floor_to_minute_ms(1_700_000_059_999));
        assert_eq!(a, b);
    }

    #[test]
    fn different_minute_yields_different_id() {
        let a = client_order_id("AAPL", Side::Long, 100, 100_500_000, floor_to_minute_ms(1_700_000_030_000));
        let b = client_order_id("AAPL", Side::Long, 100, 100_500_000, floor_to_minute_ms(1_700_000_090_000));
        assert_ne!(a, b);
    }

    #[test]
    fn different_symbol_or_qty_yields_different_id() {
        let base = client_order_id("AAPL", Side::Long, 100, 100_500_000, 0);
        assert_ne!(base, client_order_id("MSFT", Side::Long, 100, 100_500_000, 0));
        assert_ne!(base, client_order_id("AAPL", Side::Long, 101, 100_500_000, 0));
        assert_ne!(base, client_order_id("AAPL", Side::Short, 100, 100_500_000, 0));
    }
}
