//! Timestamp parsing. Values that match none of the accepted layouts become
//! `None` instead of failing the dataset.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::record::{CheckedFix, TimedFix, TrackFix};

/// Layouts without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses every timestamp. Returns the fixes and the number that failed.
pub fn normalize(fixes: Vec<CheckedFix>) -> (Vec<TimedFix>, usize) {
    let mut unparsable = 0usize;
    let out: Vec<TimedFix> = fixes
        .into_iter()
        .map(|fix| {
            let parsed = parse_timestamp(&fix.timestamp);
            if parsed.is_none() {
                unparsable += 1;
            }
            fix.with_timestamp(parsed)
        })
        .collect();
    (out, unparsable)
}

/// Separates fixes that cannot be ordered. A null timestamp is a missing
/// mandatory value, so those fixes are dropped and counted.
pub fn drop_unordered(fixes: Vec<TimedFix>) -> (Vec<TrackFix>, usize) {
    let before = fixes.len();
    let out: Vec<TrackFix> = fixes
        .into_iter()
        .filter_map(|fix| {
            let ts = fix.timestamp?;
            Some(fix.with_timestamp(ts))
        })
        .collect();
    let dropped = before - out.len();
    (out, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn checked(ts: &str) -> CheckedFix {
        CheckedFix {
            timestamp: ts.to_string(),
            lat: 1.0,
            lon: 3.0,
            individual_id: "A".into(),
            tag_id: "T1".into(),
            species: None,
            study_name: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn parses_common_layouts() {
        let expected = Utc.with_ymd_and_hms(2013, 3, 8, 5, 45, 10).unwrap();
        for input in [
            "2013-03-08 05:45:10",
            "2013-03-08 05:45:10.000",
            "2013-03-08T05:45:10",
            "2013-03-08T05:45:10Z",
            "2013-03-08T07:45:10+02:00",
            "2013-03-08 05:45:10+00:00",
            "2013/03/08 05:45:10",
            "03/08/2013 05:45:10",
            "  2013-03-08 05:45:10  ",
        ] {
            assert_eq!(parse_timestamp(input), Some(expected), "input {input:?}");
        }
        assert_eq!(
            parse_timestamp("2013-03-08"),
            Some(Utc.with_ymd_and_hms(2013, 3, 8, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("03/08/2013 05:45"),
            Some(Utc.with_ymd_and_hms(2013, 3, 8, 5, 45, 0).unwrap())
        );
    }

    #[test]
    fn keeps_fractional_seconds() {
        let ts = parse_timestamp("2013-03-08 05:45:10.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn unparsable_values_become_null() {
        assert_eq!(parse_timestamp("error"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("2013-13-45 99:00:00"), None);

        let (timed, unparsable) = normalize(vec![checked("2013-03-08 05:45:10"), checked("error")]);
        assert_eq!(unparsable, 1);
        assert!(timed[0].timestamp.is_some());
        assert!(timed[1].timestamp.is_none());
    }

    #[test]
    fn null_timestamps_are_dropped_before_ordering() {
        let (timed, _) = normalize(vec![
            checked("error"),
            checked("2013-03-08 05:45:10"),
            checked("n/a"),
        ]);
        let (ordered, dropped) = drop_unordered(timed);
        assert_eq!(dropped, 2);
        assert_eq!(ordered.len(), 1);
        assert_eq!(
            ordered[0].timestamp,
            Utc.with_ymd_and_hms(2013, 3, 8, 5, 45, 10).unwrap()
        );
    }
}
