//! Pure functions driving Position state (§4.1.1, §9 "ordered enum with
//! monotonic transitions"). No locking, no I/O — every function here is a
//! deterministic function of `(current_state, r_multiple, exit_history)`,
//! matching the design note that transitions carry no stored "next state"
//! hint.

use tcx_core::{ProtectionState, Side};

/// R-multiple in milli-R (`r * 1000`), per §3 invariant 1: `undefined` risk
/// (non-positive `entry - stop`) is treated as zero, never a divide panic or
/// `NaN`.
pub fn r_multiple_milli(side: Side, entry_micros: i64, stop_micros: i64, current_micros: i64) -> i64 {
    let risk = match side {
        Side::Long => entry_micros - stop_micros,
        Side::Short => stop_micros - entry_micros,
    };
    if risk <= 0 {
        return 0;
    }
    let pl = match side {
        Side::Long => current_micros - entry_micros,
        Side::Short => entry_micros - current_micros,
    };
    // milli-R = 1000 * pl / risk, using i128 to avoid overflow on the
    // intermediate product for large micros values.
    ((pl as i128 * 1000) / risk as i128) as i64
}

/// §4.1.1 protection-state predicates, applied after a price update
/// recomputes R. Returns the state the position should observe *next*;
/// callers must never regress past the current state (P3) — this function
/// only ever returns `current` or a state strictly ahead of it.
pub fn next_protection_state(
    current: ProtectionState,
    r_multiple_milli: i64,
    partial_exit_count: usize,
    remaining_quantity: i64,
) -> ProtectionState {
    let r = r_multiple_milli;
    let mut state = current;

    if state == ProtectionState::InitialRisk && r >= 1_000 {
        state = ProtectionState::BreakevenProtected;
    }
    if state == ProtectionState::BreakevenProtected && r >= 2_000 && partial_exit_count >= 1 {
        state = ProtectionState::PartialProfitTaken;
    }
    if state == ProtectionState::PartialProfitTaken && r >= 3_000 && partial_exit_count >= 2 {
        state = ProtectionState::AdvancedProfitTaken;
    }
    if state == ProtectionState::AdvancedProfitTaken && (r >= 4_000 || remaining_quantity == 0) {
        state = ProtectionState::FinalProfitTaken;
    }

    state
}
