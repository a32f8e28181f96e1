//! Mandatory-field and exact-duplicate filtering.

use std::collections::{BTreeMap, HashSet};

use ordered_float::OrderedFloat;

use crate::record::{CheckedFix, RawRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QualitySummary {
    pub missing_dropped: usize,
    pub duplicates_dropped: usize,
}

/// Full-row identity of a checked fix, passthrough columns included.
#[derive(Hash, PartialEq, Eq)]
struct RowKey<'a> {
    timestamp: &'a str,
    lat: OrderedFloat<f64>,
    lon: OrderedFloat<f64>,
    individual_id: &'a str,
    tag_id: &'a str,
    species: Option<&'a str>,
    study_name: Option<&'a str>,
    extra: &'a BTreeMap<String, String>,
}

impl<'a> RowKey<'a> {
    fn of(fix: &'a CheckedFix) -> Self {
        Self {
            timestamp: &fix.timestamp,
            lat: OrderedFloat(fix.lat),
            lon: OrderedFloat(fix.lon),
            individual_id: &fix.individual_id,
            tag_id: &fix.tag_id,
            species: fix.species.as_deref(),
            study_name: fix.study_name.as_deref(),
            extra: &fix.extra,
        }
    }
}

/// Drops records missing a mandatory field, then exact duplicates (first
/// occurrence wins). Relative order of the survivors is preserved.
pub fn filter(records: Vec<RawRecord>) -> (Vec<CheckedFix>, QualitySummary) {
    let total = records.len();
    let checked: Vec<CheckedFix> = records.into_iter().filter_map(CheckedFix::from_raw).collect();
    let missing_dropped = total - checked.len();

    let (deduped, duplicates_dropped) = drop_duplicates(checked);
    (
        deduped,
        QualitySummary {
            missing_dropped,
            duplicates_dropped,
        },
    )
}

fn drop_duplicates(fixes: Vec<CheckedFix>) -> (Vec<CheckedFix>, usize) {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(fixes.len());
        fixes.iter().map(|fix| seen.insert(RowKey::of(fix))).collect()
    };
    let before = fixes.len();
    let out: Vec<CheckedFix> = fixes
        .into_iter()
        .zip(keep)
        .filter_map(|(fix, first)| first.then_some(fix))
        .collect();
    let dropped = before - out.len();
    (out, dropped)
}
