use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::EnrichedFix;

/// Column order of the unified table.
pub const UNIFIED_COLUMNS: [&str; 11] = [
    "study_tag_id",
    "timestamp",
    "location_lat",
    "location_lon",
    "distance_from_prev_m",
    "time_diff_s",
    "speed_mps",
    "individual_local_identifier",
    "tag_local_identifier",
    "individual_taxon_canonical_name",
    "study_name",
];

/// One row of the merged output, in the canonical external schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    pub study_tag_id: String,
    pub timestamp: DateTime<Utc>,
    pub location_lat: f64,
    pub location_lon: f64,
    pub distance_from_prev_m: Option<f64>,
    pub time_diff_s: f64,
    pub speed_mps: Option<f64>,
    pub individual_local_identifier: String,
    pub tag_local_identifier: String,
    pub individual_taxon_canonical_name: Option<String>,
    /// The fix's study name, or the dataset name when it has none.
    pub study_name: String,
}

/// `<study>_<tag>`. The dataset name stands in for a missing study name.
pub fn study_tag_id(study_name: Option<&str>, dataset: &str, tag_id: &str) -> String {
    let study = study_name.filter(|s| !s.trim().is_empty()).unwrap_or(dataset);
    format!("{study}_{tag_id}")
}

impl UnifiedRecord {
    pub fn from_enriched(dataset: &str, enriched: EnrichedFix) -> Self {
        let EnrichedFix { fix, kinematics } = enriched;
        let study_name = fix
            .study_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| dataset.to_string());
        Self {
            study_tag_id: study_tag_id(Some(&study_name), dataset, &fix.tag_id),
            timestamp: fix.timestamp,
            location_lat: fix.lat,
            location_lon: fix.lon,
            distance_from_prev_m: kinematics.distance_m,
            time_diff_s: kinematics.time_diff_s,
            speed_mps: kinematics.speed_mps,
            individual_local_identifier: fix.individual_id,
            tag_local_identifier: fix.tag_id,
            individual_taxon_canonical_name: fix.species,
            study_name,
        }
    }
}

/// Projects every dataset onto the unified schema and concatenates them in
/// the order given. Tracks from different datasets are never merged, even
/// when their identifiers coincide.
pub fn merge<I>(datasets: I) -> Vec<UnifiedRecord>
where
    I: IntoIterator<Item = (String, Vec<EnrichedFix>)>,
{
    let mut out = Vec::new();
    for (name, fixes) in datasets {
        out.reserve(fixes.len());
        out.extend(
            fixes
                .into_iter()
                .map(|e| UnifiedRecord::from_enriched(&name, e)),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Kinematics, TrackFix};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn enriched(ind: &str, tag: &str, study: Option<&str>) -> EnrichedFix {
        let mut extra = BTreeMap::new();
        extra.insert("event-id".to_string(), "24174715705".to_string());
        EnrichedFix {
            fix: TrackFix {
                timestamp: Utc.with_ymd_and_hms(2013, 3, 10, 7, 1, 29).unwrap(),
                lat: -64.191,
                lon: 169.181,
                individual_id: ind.into(),
                tag_id: tag.into(),
                species: Some("Blue whale".into()),
                study_name: study.map(String::from),
                extra,
            },
            kinematics: Kinematics::new(Some(5.9), 10.5),
        }
    }

    #[test]
    fn builds_study_tag_id() {
        assert_eq!(study_tag_id(Some("Blue Whale Study"), "file", "Tag1"), "Blue Whale Study_Tag1");
        assert_eq!(study_tag_id(None, "file", "Tag2"), "file_Tag2");
        assert_eq!(study_tag_id(Some(" "), "file", "Tag3"), "file_Tag3");
    }

    #[test]
    fn projects_onto_canonical_columns() {
        let row = UnifiedRecord::from_enriched("ds", enriched("121205", "T1", Some("Blue Whale Study")));
        assert_eq!(row.study_tag_id, "Blue Whale Study_T1");
        assert_eq!(row.location_lat, -64.191);
        assert_eq!(row.location_lon, 169.181);
        assert_eq!(row.distance_from_prev_m, Some(5.9));
        assert_eq!(row.time_diff_s, 10.5);
        assert_eq!(row.individual_local_identifier, "121205");
        assert_eq!(row.tag_local_identifier, "T1");
        assert_eq!(row.individual_taxon_canonical_name.as_deref(), Some("Blue whale"));
        assert_eq!(row.study_name, "Blue Whale Study");

        let json = serde_json::to_value(&row).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), UNIFIED_COLUMNS.len());
        for column in UNIFIED_COLUMNS {
            assert!(object.contains_key(column), "missing {column}");
        }
        assert!(!object.contains_key("event-id"));
    }

    #[test]
    fn missing_study_name_falls_back_in_both_columns() {
        for study in [None, Some("  ")] {
            let row = UnifiedRecord::from_enriched("narwhal", enriched("N1", "T9", study));
            assert_eq!(row.study_tag_id, "narwhal_T9");
            assert_eq!(row.study_name, "narwhal");
        }
    }

    #[test]
    fn concatenates_without_cross_dataset_dedup() {
        let merged = merge(vec![
            ("study a".to_string(), vec![enriched("W", "T", Some("A")), enriched("W", "T", Some("A"))]),
            ("study b".to_string(), Vec::new()),
            ("study c".to_string(), vec![enriched("W", "T", Some("C"))]),
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].study_tag_id, "A_T");
        assert_eq!(merged[2].study_tag_id, "C_T");
    }
}
