//! §4.4.2 partial-exit schedule. Configurable milestone table; defaults to
//! 50/25/25 at 1R/2R/3R (§9 open question 1 — the 1/2/3R schedule is the
//! one this implementation treats as default, with thresholds exposed as
//! configuration per the spec's resolution).

/// One milestone in the schedule: fires once `r_multiple_milli` reaches
/// `r_threshold_milli`, selling `pct_of_original` of `original_quantity`
/// (except the final milestone, which always takes the remainder).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartialExitMilestone {
    pub r_threshold_milli: i64,
    pub pct_of_original: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartialExitSchedule(pub Vec<PartialExitMilestone>);

impl Default for PartialExitSchedule {
    fn default() -> Self {
        Self(vec![
            PartialExitMilestone { r_threshold_milli: 1_000, pct_of_original: 0.50 },
            PartialExitMilestone { r_threshold_milli: 2_000, pct_of_original: 0.25 },
            PartialExitMilestone { r_threshold_milli: 3_000, pct_of_original: 0.25 },
        ])
    }
}

/// The post-exit stop level a milestone should move to, per §4.4 step 3
/// ("the post-exit stop is the current breakeven/trailing level") — callers
/// pass in whatever `trailing_stop::required_stop_update` (or the current
/// stop, if no better target exists) already resolved for this tick.
///
/// Returns the exit quantity due at the *next* unfired milestone, or `None`
/// if no milestone is due. A milestone fires only once (guarded by
/// `partial_exits_fired`, matching §4.4.2's "tracked via
/// `len(partial_exits)`").
pub fn required_partial_exit(
    schedule: &PartialExitSchedule,
    r_multiple_milli: i64,
    original_quantity: i64,
    partial_exits_fired: usize,
    remaining_quantity: i64,
) -> Option<i64> {
    let milestone = schedule.0.get(partial_exits_fired)?;
    if r_multiple_milli < milestone.r_threshold_milli {
        return None;
    }
    let is_last = partial_exits_fired + 1 == schedule.0.len();
    let qty = if is_last {
        remaining_quantity
    } else {
        ((original_quantity as f64) * milestone.pct_of_original).floor() as i64
    };
    let qty = qty.min(remaining_quantity);
    (qty > 0).then_some(qty)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scenario 2 (§8): long 100 shares, default schedule.
    #[test]
    fn default_schedule_matches_scenario_2() {
        let schedule = PartialExitSchedule::default();

        // R=1.0, no prior exits -> 50 shares.
        let e0 = required_partial_exit(&schedule, 1_000, 100, 0, 100);
        assert_eq!(e0, Some(50));

        // R=2.0, one prior exit, 50 remaining -> 25 shares.
        let e1 = required_partial_exit(&schedule, 2_000, 100, 1, 50);
        assert_eq!(e1, Some(25));

        // R=3.0, two prior exits, 25 remaining (last milestone) -> remainder.
        let e2 = required_partial_exit(&schedule, 3_000, 100, 2, 25);
        assert_eq!(e2, Some(25));

        // Fully exited: no further milestone.
        let e3 = required_partial_exit(&schedule, 5_000, 100, 3, 0);
        assert_eq!(e3, None);
    }

    #[test]
    fn milestone_does_not_fire_twice_below_threshold() {
        let schedule = PartialExitSchedule::default();
        assert_eq!(required_partial_exit(&schedule, 1_500, 100, 1, 50), None);
    }

    #[test]
    fn odd_share_counts_floor_non_final_milestones() {
        let schedule = PartialExitSchedule::default();
        // 101 shares at 50% floors to 50, leaving 51 for later milestones.
        let e0 = required_partial_exit(&schedule, 1_000, 101, 0, 101);
        assert_eq!(e0, Some(50));
    }

    #[test]
    fn zero_remaining_quantity_never_fires() {
        let schedule = PartialExitSchedule::default();
        assert_eq!(required_partial_exit(&schedule, 1_000, 100, 0, 0), None);
    }
}
