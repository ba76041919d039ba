//! §4.4.1 trailing-stop table. Pure function of `(side, entry, initial_risk,
//! r_multiple, current_stop)` — no I/O, no locking. The caller (C4's tick)
//! decides whether to actually call C2 with the result.

use tcx_core::Side;

/// Target stop at R-multiple `r` (in milli-R) given the position's fixed
/// `entry` and `initial_risk` (both in micros). Returns `None` when the
/// target would not be strictly better than `current_stop_micros` — a stop
/// update is only issued when it advances monotonicity (§4.4.1, P1).
pub fn required_stop_update(
    side: Side,
    entry_micros: i64,
    initial_risk_micros: i64,
    r_multiple_milli: i64,
    current_stop_micros: i64,
) -> Option<i64> {
    if initial_risk_micros <= 0 {
        return None;
    }
    let r = r_multiple_milli;
    if r < 1_000 {
        return None;
    }

    // Offset from entry, in multiples of initial risk, per the table.
    let offset_micros = if r < 1_500 {
        0
    } else if r < 2_000 {
        initial_risk_micros / 2
    } else if r < 3_000 {
        initial_risk_micros
    } else if r < 4_000 {
        initial_risk_micros * 3 / 2
    } else {
        initial_risk_micros * 2
    };

    let target = match side {
        Side::Long => entry_micros + offset_micros,
        Side::Short => entry_micros - offset_micros,
    };

    let strictly_better = match side {
        Side::Long => target > current_stop_micros,
        Side::Short => target < current_stop_micros,
    };

    strictly_better.then_some(target)
}
