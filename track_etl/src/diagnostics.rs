//! Read-only inspection of a raw dataset, without running the pipeline.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::{
    COL_INDIVIDUAL, COL_LAT, COL_LON, COL_TAG, COL_TIMESTAMP, MANDATORY_COLUMNS,
};
use crate::record::Dataset;
use crate::timestamp::parse_timestamp;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DatasetDiagnostics {
    pub dataset: String,
    pub records: usize,
    /// Empty cells per mandatory column.
    pub missing: BTreeMap<&'static str, usize>,
    /// Records with at least one mandatory value missing.
    pub incomplete_records: usize,
    pub unparsable_timestamps: usize,
    pub individuals: usize,
    /// Distinct (individual, tag) pairs.
    pub tracks: usize,
    pub species: BTreeMap<String, usize>,
    pub records_without_species: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub passthrough_columns: Vec<String>,
}

pub fn diagnose(dataset: &Dataset) -> DatasetDiagnostics {
    let mut diag = DatasetDiagnostics {
        dataset: dataset.name.clone(),
        records: dataset.records.len(),
        ..DatasetDiagnostics::default()
    };
    for column in MANDATORY_COLUMNS {
        diag.missing.insert(column, 0);
    }

    let mut individuals = HashSet::new();
    let mut tracks = HashSet::new();
    let mut passthrough = BTreeSet::new();

    for record in &dataset.records {
        let present = [
            (COL_TIMESTAMP, record.timestamp.is_some()),
            (COL_LAT, record.lat.is_some()),
            (COL_LON, record.lon.is_some()),
            (COL_INDIVIDUAL, record.individual_id.is_some()),
            (COL_TAG, record.tag_id.is_some()),
        ];
        let mut complete = true;
        for (column, ok) in present {
            if !ok {
                complete = false;
                *diag.missing.entry(column).or_default() += 1;
            }
        }
        if !complete {
            diag.incomplete_records += 1;
        }

        if let Some(raw) = record.timestamp.as_deref() {
            match parse_timestamp(raw) {
                Some(ts) => {
                    diag.first_timestamp = Some(diag.first_timestamp.map_or(ts, |t| t.min(ts)));
                    diag.last_timestamp = Some(diag.last_timestamp.map_or(ts, |t| t.max(ts)));
                }
                None => diag.unparsable_timestamps += 1,
            }
        }

        if let Some(ind) = record.individual_id.as_deref() {
            individuals.insert(ind);
            if let Some(tag) = record.tag_id.as_deref() {
                tracks.insert((ind, tag));
            }
        }

        match record.species.as_deref() {
            Some(species) => *diag.species.entry(species.to_string()).or_default() += 1,
            None => diag.records_without_species += 1,
        }
        passthrough.extend(record.extra.keys().map(String::as_str));
    }

    diag.individuals = individuals.len();
    diag.tracks = tracks.len();
    diag.passthrough_columns = passthrough.into_iter().map(String::from).collect();
    diag
}
