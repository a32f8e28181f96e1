use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row as delivered by the ingestion adapter. Every field may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub timestamp: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub individual_id: Option<String>,
    pub tag_id: Option<String>,
    pub species: Option<String>,
    pub study_name: Option<String>,
    /// Columns the engine does not interpret, keyed by header.
    pub extra: BTreeMap<String, String>,
}

/// Raw table for one field study.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub records: Vec<RawRecord>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

/// A fix whose mandatory fields are present. `T` is the timestamp
/// representation for the stage the fix is in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fix<T> {
    pub timestamp: T,
    pub lat: f64,
    pub lon: f64,
    pub individual_id: String,
    pub tag_id: String,
    pub species: Option<String>,
    pub study_name: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// Output of the quality filter: timestamp still textual.
pub type CheckedFix = Fix<String>;
/// Output of the temporal normalizer: `None` marks an unparsable timestamp.
pub type TimedFix = Fix<Option<DateTime<Utc>>>;
/// A fix that can be ordered within its track.
pub type TrackFix = Fix<DateTime<Utc>>;

impl<T> Fix<T> {
    pub fn with_timestamp<U>(self, timestamp: U) -> Fix<U> {
        Fix {
            timestamp,
            lat: self.lat,
            lon: self.lon,
            individual_id: self.individual_id,
            tag_id: self.tag_id,
            species: self.species,
            study_name: self.study_name,
            extra: self.extra,
        }
    }

    /// Two fixes belong to the same track when both identifiers match.
    pub fn same_track<U>(&self, other: &Fix<U>) -> bool {
        self.individual_id == other.individual_id && self.tag_id == other.tag_id
    }
}

impl CheckedFix {
    /// Returns `None` when any mandatory field is missing. Blank text and
    /// non-finite coordinates count as missing.
    pub fn from_raw(raw: RawRecord) -> Option<Self> {
        let timestamp = non_blank(raw.timestamp)?;
        let lat = raw.lat.filter(|v| v.is_finite())?;
        let lon = raw.lon.filter(|v| v.is_finite())?;
        let individual_id = non_blank(raw.individual_id)?;
        let tag_id = non_blank(raw.tag_id)?;
        Some(Fix {
            timestamp,
            lat,
            lon,
            individual_id,
            tag_id,
            species: raw.species,
            study_name: raw.study_name,
            extra: raw.extra,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Motion relative to the preceding fix of the same track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    /// `None` when the distance could not be computed for the coordinate pair.
    pub distance_m: Option<f64>,
    pub time_diff_s: f64,
    /// `None` only when the distance is undefined over a positive interval.
    pub speed_mps: Option<f64>,
}

impl Kinematics {
    /// Values for a fix with no predecessor in its track.
    pub const TRACK_START: Kinematics = Kinematics {
        distance_m: Some(0.0),
        time_diff_s: 0.0,
        speed_mps: Some(0.0),
    };

    pub fn new(distance_m: Option<f64>, time_diff_s: f64) -> Self {
        let speed_mps = if time_diff_s > 0.0 {
            distance_m.map(|d| d / time_diff_s)
        } else {
            Some(0.0)
        };
        Self {
            distance_m,
            time_diff_s,
            speed_mps,
        }
    }

    pub fn exceeds(&self, max_speed_mps: f64) -> bool {
        self.speed_mps.is_some_and(|s| s > max_speed_mps)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFix {
    pub fix: TrackFix,
    pub kinematics: Kinematics,
}

impl EnrichedFix {
    pub fn into_fix(self) -> TrackFix {
        self.fix
    }
}

impl AsRef<TrackFix> for TrackFix {
    fn as_ref(&self) -> &TrackFix {
        self
    }
}

impl AsRef<TrackFix> for EnrichedFix {
    fn as_ref(&self) -> &TrackFix {
        &self.fix
    }
}
