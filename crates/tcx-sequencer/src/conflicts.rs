//! Conflict detection and share-availability arithmetic (§4.2
//! `detect_conflicts`, `verify_shares_available`, §4.2.1 conflict policy).
//! Pure functions: the sequencer gathers broker state first, then hands it
//! here for a deterministic verdict.

use tcx_core::{Order, OrderConflict, OrderStatus, OrderType, ShareAvailability, Side};

/// Which atomic sequence is about to run, so conflict detection can apply
/// the right checks (a stop update only needs one side's shares; a partial
/// exit needs `exit_qty` of them free).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceOp {
    StopUpdate { new_stop_micros: i64 },
    PartialExit { exit_qty: i64, new_stop_micros: i64 },
}

impl SequenceOp {
    fn new_stop_micros(self) -> i64 {
        match self {
            SequenceOp::StopUpdate { new_stop_micros } => new_stop_micros,
            SequenceOp::PartialExit { new_stop_micros, .. } => new_stop_micros,
        }
    }

    fn required_qty(self) -> i64 {
        match self {
            SequenceOp::StopUpdate { .. } => 0,
            SequenceOp::PartialExit { exit_qty, .. } => exit_qty,
        }
    }
}

/// Sell-side orders (the stop and limit exit legs) lock shares out of what
/// a new sell-side submission could use (§4.2.1 `SHARES_LOCKED`).
fn is_sell_side_exit(order: &Order, position_side: Side) -> bool {
    let closes_position = match position_side {
        Side::Long => !order.is_buy,
        Side::Short => order.is_buy,
    };
    closes_position && matches!(order.order_type, OrderType::Stop | OrderType::Limit | OrderType::TrailingStop)
}

/// Enumerates the conflict categories in §4.2 for the given symbol/op.
/// `open_orders` must already be filtered to this symbol's working orders.
/// `lock_contended` is `true` when acquiring the symbol lock required
/// waiting on another in-flight sequence.
pub fn detect_conflicts(
    op: SequenceOp,
    open_orders: &[Order],
    position_qty: Option<i64>,
    position_side: Side,
    lock_contended: bool,
) -> Vec<OrderConflict> {
    let mut conflicts = Vec::new();

    if lock_contended {
        conflicts.push(OrderConflict::ConcurrentModification);
    }

    let open_stop_orders: Vec<&Order> = open_orders
        .iter()
        .filter(|o| o.order_type == OrderType::Stop && !o.status.is_terminal())
        .collect();
    if open_stop_orders.len() > 1 {
        conflicts.push(OrderConflict::DuplicateOrder);
    }

    match position_qty {
        None => conflicts.push(OrderConflict::InsufficientShares),
        Some(qty) => {
            let locked: i64 = open_orders
                .iter()
                .filter(|o| !o.status.is_terminal() && is_sell_side_exit(o, position_side))
                .map(|o| o.qty - o.filled_qty)
                .sum();
            let availability = verify_shares_available(qty.abs(), locked, op.required_qty());
            if !availability.is_available {
                if availability.locked > 0 {
                    conflicts.push(OrderConflict::SharesLocked);
                } else {
                    conflicts.push(OrderConflict::InsufficientShares);
                }
            }
        }
    }

    if op.new_stop_micros() <= 0 {
        conflicts.push(OrderConflict::InvalidPrice);
    }

    conflicts
}

/// `available = |position_qty| - locked`; `is_available` is whether
/// `required_qty` fits within that (§4.2 `verify_shares_available`).
pub fn verify_shares_available(position_qty_abs: i64, locked: i64, required_qty: i64) -> ShareAvailability {
    let available = (position_qty_abs - locked).max(0);
    ShareAvailability { available, locked, is_available: available >= required_qty }
}

/// `true` if any order in `open_orders` would block a fresh stop
/// submission and must be canceled first (§4.2.1 `DUPLICATE_ORDER`).
pub fn has_duplicate_stop(open_orders: &[Order]) -> bool {
    open_orders
        .iter()
        .filter(|o| o.order_type == OrderType::Stop && !o.status.is_terminal())
        .count()
        > 1
}
