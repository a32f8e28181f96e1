//! Per-track distance, elapsed time and speed.
//!
//! Fixes are stably sorted by (individual, tag, timestamp) and then processed
//! one track at a time: the first fix of a track gets
//! [`Kinematics::TRACK_START`], every other fix is measured against its
//! immediate predecessor in the same track.

use std::cmp::Ordering;

use crate::geodesy::DistanceModel;
use crate::record::{EnrichedFix, Kinematics, TrackFix};

fn track_order(a: &TrackFix, b: &TrackFix) -> Ordering {
    a.individual_id
        .cmp(&b.individual_id)
        .then_with(|| a.tag_id.cmp(&b.tag_id))
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}

/// Stable sort into track order. Fixes sharing a timestamp within a track
/// keep their input order.
pub fn sort_tracks(fixes: &mut [TrackFix]) {
    fixes.sort_by(track_order);
}

/// Kinematics of `next` relative to `prev`, which must precede it in the
/// same track.
pub fn between(prev: &TrackFix, next: &TrackFix, model: DistanceModel) -> Kinematics {
    let elapsed = next.timestamp - prev.timestamp;
    let time_diff_s = match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => elapsed.num_milliseconds() as f64 / 1e3,
    };
    let distance_m = model.distance(prev.lat, prev.lon, next.lat, next.lon);
    Kinematics::new(distance_m, time_diff_s.max(0.0))
}

/// Kinematics for one track, already in time order.
pub fn track_kinematics<F: AsRef<TrackFix>>(track: &[F], model: DistanceModel) -> Vec<Kinematics> {
    if track.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(track.len());
    out.push(Kinematics::TRACK_START);
    out.extend(
        track
            .windows(2)
            .map(|w| between(w[0].as_ref(), w[1].as_ref(), model)),
    );
    out
}

/// Sorts the fixes into track order and enriches every one of them. The
/// output has exactly one entry per input fix.
pub fn compute(mut fixes: Vec<TrackFix>, model: DistanceModel) -> Vec<EnrichedFix> {
    sort_tracks(&mut fixes);
    let kinematics: Vec<Kinematics> = fixes
        .chunk_by(|a, b| a.same_track(b))
        .flat_map(|track| track_kinematics(track, model))
        .collect();
    debug_assert_eq!(kinematics.len(), fixes.len());
    fixes
        .into_iter()
        .zip(kinematics)
        .map(|(fix, kinematics)| EnrichedFix { fix, kinematics })
        .collect()
}

/// Recomputes kinematics over the final adjacency of an already sorted table
/// without modifying it, and counts fixes whose speed would exceed the
/// threshold. Undefined speeds are not counted.
pub fn count_residual_outliers(fixes: &[EnrichedFix], model: DistanceModel, max_speed_mps: f64) -> usize {
    fixes
        .chunk_by(|a, b| a.fix.same_track(&b.fix))
        .map(|track| {
            track_kinematics(track, model)
                .iter()
                .filter(|k| k.exceeds(max_speed_mps))
                .count()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn fix(ind: &str, tag: &str, secs: i64, lat: f64, lon: f64) -> TrackFix {
        TrackFix {
            timestamp: Utc.with_ymd_and_hms(2013, 3, 8, 11, 24, 4).unwrap() + Duration::seconds(secs),
            lat,
            lon,
            individual_id: ind.into(),
            tag_id: tag.into(),
            species: None,
            study_name: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn consecutive_whale_fixes() {
        let out = compute(
            vec![
                fix("121205", "121205", 0, -64.217, 169.116),
                fix("121205", "121205", 731, -64.242, 169.103),
            ],
            DistanceModel::GreatCircle,
        );
        assert_eq!(out[0].kinematics, Kinematics::TRACK_START);
        let k = out[1].kinematics;
        assert_eq!(k.time_diff_s, 731.0);
        let expected = DistanceModel::GreatCircle
            .distance(-64.217, 169.116, -64.242, 169.103)
            .unwrap();
        assert_eq!(k.distance_m, Some(expected));
        let speed = k.speed_mps.unwrap();
        assert!((speed - expected / 731.0).abs() < 1e-12);
        assert!((speed - 3.899).abs() < 0.01);
    }

    #[test]
    fn sorts_by_individual_tag_then_time() {
        let out = compute(
            vec![
                fix("B", "t1", 100, 0.0, 0.0),
                fix("A", "t2", 50, 0.0, 0.0),
                fix("A", "t1", 200, 0.0, 0.0),
                fix("A", "t1", 100, 0.0, 0.0),
            ],
            DistanceModel::GreatCircle,
        );
        let order: Vec<(&str, &str)> = out
            .iter()
            .map(|e| (e.fix.individual_id.as_str(), e.fix.tag_id.as_str()))
            .collect();
        assert_eq!(order, vec![("A", "t1"), ("A", "t1"), ("A", "t2"), ("B", "t1")]);
        assert!(out[0].fix.timestamp < out[1].fix.timestamp);
    }

    #[test]
    fn resets_at_every_track_boundary() {
        let out = compute(
            vec![
                fix("A", "t1", 0, 10.0, 10.0),
                fix("A", "t1", 600, 10.01, 10.0),
                fix("A", "t2", 1200, 10.02, 10.0),
                fix("B", "t2", 1800, 10.03, 10.0),
                fix("B", "t2", 2400, 10.04, 10.0),
            ],
            DistanceModel::GreatCircle,
        );
        assert_eq!(out.len(), 5);
        for (i, e) in out.iter().enumerate() {
            let boundary = i == 0 || !out[i - 1].fix.same_track(&e.fix);
            if boundary {
                assert_eq!(e.kinematics.distance_m, Some(0.0));
                assert_eq!(e.kinematics.time_diff_s, 0.0);
                assert_eq!(e.kinematics.speed_mps, Some(0.0));
            } else {
                assert_eq!(e.kinematics.time_diff_s, 600.0);
                assert!(e.kinematics.distance_m.unwrap() > 1000.0);
            }
        }
    }

    #[test]
    fn equal_timestamps_keep_input_order_and_zero_interval() {
        let mut second = fix("A", "t1", 60, 1.0, 1.0);
        second.extra.insert("seq".into(), "first".into());
        let mut third = fix("A", "t1", 60, 1.001, 1.0);
        third.extra.insert("seq".into(), "second".into());
        let out = compute(
            vec![fix("A", "t1", 0, 1.0, 1.0), second, third],
            DistanceModel::GreatCircle,
        );
        assert_eq!(out[1].fix.extra["seq"], "first");
        assert_eq!(out[2].fix.extra["seq"], "second");
        assert_eq!(out[2].kinematics.time_diff_s, 0.0);
        assert_eq!(out[2].kinematics.speed_mps, Some(0.0));
        assert!(out[2].kinematics.distance_m.unwrap() > 0.0);
    }

    #[test]
    fn undefined_distance_propagates_as_null() {
        let out = compute(
            vec![fix("A", "t1", 0, 0.0, 0.0), fix("A", "t1", 60, 95.0, 0.0)],
            DistanceModel::GreatCircle,
        );
        assert_eq!(out[1].kinematics.distance_m, None);
        assert_eq!(out[1].kinematics.time_diff_s, 60.0);
        assert_eq!(out[1].kinematics.speed_mps, None);
    }

    #[test]
    fn sub_second_intervals() {
        let mut b = fix("A", "t1", 0, 0.0, 0.0);
        b.timestamp += Duration::milliseconds(500);
        let out = compute(vec![fix("A", "t1", 0, 0.0, 0.0), b], DistanceModel::GreatCircle);
        assert_eq!(out[1].kinematics.time_diff_s, 0.5);
    }

    #[test]
    fn sub_millisecond_intervals_stay_positive() {
        let mut b = fix("A", "t1", 0, 0.0001, 0.0);
        b.timestamp += Duration::microseconds(400);
        let out = compute(vec![fix("A", "t1", 0, 0.0, 0.0), b], DistanceModel::GreatCircle);
        let k = out[1].kinematics;
        assert!((k.time_diff_s - 0.0004).abs() < 1e-12);
        assert!(k.speed_mps.unwrap() > 0.0);
    }

    #[test]
    fn residual_audit_uses_final_adjacency() {
        // 0.1 degree of latitude is ~11 km; over 600 s that is ~18.5 m/s.
        let enriched = compute(
            vec![fix("A", "t1", 0, 0.0, 0.0), fix("A", "t1", 600, 0.1, 0.0)],
            DistanceModel::GreatCircle,
        );
        // Stale kinematics stored on the fix do not matter to the audit.
        let mut stale = enriched.clone();
        stale[1].kinematics = Kinematics::TRACK_START;
        assert_eq!(count_residual_outliers(&stale, DistanceModel::GreatCircle, 10.0), 1);
        assert_eq!(count_residual_outliers(&stale, DistanceModel::GreatCircle, 20.0), 0);
        assert_eq!(count_residual_outliers(&[], DistanceModel::GreatCircle, 10.0), 0);
    }
}
