use serde::{Deserialize, Serialize};

use crate::geodesy::DistanceModel;
use crate::{EtlError, Params};

/// Counts for one kinematics/filter pass over a dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: usize,
    pub input_records: usize,
    pub undefined_distances: usize,
    pub zero_interval_removed: usize,
    pub outliers_removed: usize,
    pub retained_pct: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub input_records: usize,
    pub missing_dropped: usize,
    pub duplicates_dropped: usize,
    pub unparsable_timestamps: usize,
    pub passes: Vec<PassReport>,
    /// Fixes whose speed still exceeds the threshold once kinematics are
    /// recomputed over the final adjacency.
    pub residual_outliers: usize,
    pub species_filled: usize,
    pub species_renamed: usize,
    pub tracks: usize,
    pub output_records: usize,
}

impl DatasetReport {
    pub fn new(dataset: &str, input_records: usize) -> Self {
        Self {
            dataset: dataset.to_string(),
            input_records,
            ..Self::default()
        }
    }

    /// Residual outliers relative to the dataset's original record count.
    pub fn residual_fraction(&self) -> f64 {
        fraction(self.residual_outliers, self.input_records)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub params_hash: String,
    pub distance_model: DistanceModel,
    pub max_speed_mps: f64,
    pub recompute_passes: usize,
    pub datasets: Vec<DatasetReport>,
    pub input_records: usize,
    pub output_records: usize,
    pub residual_outliers: usize,
    pub residual_fraction: f64,
}

impl RunReport {
    pub fn new(params: &Params, datasets: Vec<DatasetReport>) -> Result<Self, EtlError> {
        let input_records = datasets.iter().map(|d| d.input_records).sum();
        let output_records = datasets.iter().map(|d| d.output_records).sum();
        let residual_outliers = datasets.iter().map(|d| d.residual_outliers).sum();
        Ok(Self {
            params_hash: params.params_hash_sha256()?,
            distance_model: params.distance_model,
            max_speed_mps: params.max_speed_mps,
            recompute_passes: params.recompute_passes,
            datasets,
            input_records,
            output_records,
            residual_outliers,
            residual_fraction: fraction(residual_outliers, input_records),
        })
    }
}

fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
