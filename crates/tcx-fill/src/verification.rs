//! §4.3.2 multi-method fill verification — the "bulletproof fill check".
//! Four independent methods; any one positive means filled. The reported
//! `detection_method` is the highest-confidence method that fired; overall
//! confidence rises with the number of methods that agree.

use tcx_core::{DetectionMethod, Order, OrderStatus};

#[derive(Clone, Debug, PartialEq)]
pub struct BulletproofResult {
    pub filled: bool,
    pub confidence: f64,
    pub primary_method: Option<DetectionMethod>,
    pub checks_performed: Vec<DetectionMethod>,
}

fn method_confidence(method: DetectionMethod) -> f64 {
    match method {
        DetectionMethod::StatusField => 1.0,
        DetectionMethod::QuantityMatch => 1.0,
        DetectionMethod::FillPrice => 0.9,
        DetectionMethod::TimestampCheck => 0.8,
        // Not produced by this function; only assigned by the monitor on
        // the timeout/cancel-race/safety-net paths.
        _ => 0.0,
    }
}

/// Runs all four checks against the given order snapshot. Every check that
/// is attempted (positive or not) is recorded in `checks_performed` for the
/// caller's audit trail — this lets `checks_performed` in the final
/// `FillResult` show the full verification trail, not just the winners.
pub fn bulletproof_check(order: &Order) -> BulletproofResult {
    let mut positives: Vec<DetectionMethod> = Vec::new();
    let mut attempted: Vec<DetectionMethod> = Vec::new();

    attempted.push(DetectionMethod::StatusField);
    if matches!(order.status, OrderStatus::Filled) {
        positives.push(DetectionMethod::StatusField);
    }

    attempted.push(DetectionMethod::QuantityMatch);
    if order.filled_qty > 0 && order.filled_qty >= order.qty {
        positives.push(DetectionMethod::QuantityMatch);
    }

    attempted.push(DetectionMethod::FillPrice);
    if order.filled_avg_price_micros.is_some_and(|p| p > 0) {
        positives.push(DetectionMethod::FillPrice);
    }

    attempted.push(DetectionMethod::TimestampCheck);
    if order.filled_at.is_some() {
        positives.push(DetectionMethod::TimestampCheck);
    }

    let overall_confidence = match positives.len() {
        0 => 0.0,
        1 => 0.7,
        2 => 0.85,
        3 => 0.95,
        _ => 1.0,
    };

    let primary_method = positives
        .iter()
        .copied()
        .max_by(|a, b| method_confidence(*a).partial_cmp(&method_confidence(*b)).unwrap());

    BulletproofResult {
        filled: !positives.is_empty(),
        confidence: overall_confidence,
        primary_method,
        checks_performed: attempted,
    }
}

/// True when the order reports a genuine partial fill: some quantity has
/// filled but strictly less than the full order size (§4.3.1 step 4).
pub fn is_partial_fill(order: &Order) -> bool {
    order.filled_qty > 0 && order.filled_qty < order.qty
}
