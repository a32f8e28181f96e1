//! Policy-driven removal of zero-interval fixes and speed outliers. Both
//! filters expect the track-ordered output of [`crate::kinematics::compute`]
//! and preserve its order.

use crate::record::EnrichedFix;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OutlierSummary {
    pub removed: usize,
    /// Share of input fixes kept, in percent. 100 for an empty input.
    pub retained_pct: f64,
}

/// Removes fixes with a zero interval to their predecessor. The first fix of
/// each track is always kept whatever its interval.
pub fn drop_zero_intervals(fixes: Vec<EnrichedFix>) -> (Vec<EnrichedFix>, usize) {
    let keep: Vec<bool> = fixes
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let track_start = i == 0 || !fixes[i - 1].fix.same_track(&e.fix);
            track_start || e.kinematics.time_diff_s > 0.0
        })
        .collect();
    retain_flagged(fixes, keep)
}

/// Removes fixes whose speed is strictly above `max_speed_mps`. Fixes with an
/// undefined speed are kept.
pub fn drop_outliers(fixes: Vec<EnrichedFix>, max_speed_mps: f64) -> (Vec<EnrichedFix>, OutlierSummary) {
    let before = fixes.len();
    let keep: Vec<bool> = fixes
        .iter()
        .map(|e| !e.kinematics.exceeds(max_speed_mps))
        .collect();
    let (kept, removed) = retain_flagged(fixes, keep);
    let retained_pct = if before == 0 {
        100.0
    } else {
        kept.len() as f64 / before as f64 * 100.0
    };
    (
        kept,
        OutlierSummary {
            removed,
            retained_pct,
        },
    )
}

fn retain_flagged(fixes: Vec<EnrichedFix>, keep: Vec<bool>) -> (Vec<EnrichedFix>, usize) {
    let before = fixes.len();
    let out: Vec<EnrichedFix> = fixes
        .into_iter()
        .zip(keep)
        .filter_map(|(e, k)| k.then_some(e))
        .collect();
    let removed = before - out.len();
    (out, removed)
}
