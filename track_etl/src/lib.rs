//! Trajectory cleaning and kinematics engine for animal-tracking GPS datasets.
//!
//! Each field study arrives as one [`Dataset`] of raw fixes. The pipeline
//! validates and deduplicates records, parses timestamps, computes
//! distance/time/speed per track, removes zero-interval duplicates and
//! implausibly fast fixes over a bounded number of passes, normalises species
//! labels and finally merges every study into one table of [`UnifiedRecord`]s.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod diagnostics;
pub mod filter;
pub mod geodesy;
pub mod ingest;
pub mod kinematics;
pub mod merge;
pub mod pipeline;
pub mod quality;
pub mod record;
pub mod report;
pub mod taxonomy;
pub mod timestamp;

pub use diagnostics::{diagnose, DatasetDiagnostics};
pub use geodesy::DistanceModel;
pub use ingest::{dataset_name_from_path, read_dataset};
pub use merge::{merge, UnifiedRecord, UNIFIED_COLUMNS};
pub use pipeline::{clean_dataset, run, CleanedDataset, RunOutput};
pub use record::{CheckedFix, Dataset, EnrichedFix, Fix, Kinematics, RawRecord, TimedFix, TrackFix};
pub use report::{DatasetReport, PassReport, RunReport};
pub use taxonomy::{SpeciesFill, TaxonomyRules};

/// Speed above which a fix is treated as physically implausible (m/s).
pub const DEFAULT_MAX_SPEED_MPS: f64 = 10.0;

/// Initial pass plus one recompute pass.
pub const DEFAULT_RECOMPUTE_PASSES: usize = 2;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("dataset '{dataset}' is missing mandatory column '{column}'")]
    MissingColumn {
        dataset: String,
        column: &'static str,
    },
    #[error("failed to parse CSV for dataset '{dataset}': {source}")]
    Csv {
        dataset: String,
        #[source]
        source: csv::Error,
    },
    #[error("dataset name '{0}' appears more than once")]
    DuplicateDataset(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub max_speed_mps: f64,
    pub distance_model: DistanceModel,
    pub recompute_passes: usize,
    pub taxonomy: TaxonomyRules,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_speed_mps: DEFAULT_MAX_SPEED_MPS,
            distance_model: DistanceModel::default(),
            recompute_passes: DEFAULT_RECOMPUTE_PASSES,
            taxonomy: TaxonomyRules::default(),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), EtlError> {
        if !self.max_speed_mps.is_finite() || self.max_speed_mps <= 0.0 {
            return Err(EtlError::InvalidParameter(format!(
                "max_speed_mps must be a positive finite number, got {}",
                self.max_speed_mps
            )));
        }
        if self.recompute_passes == 0 {
            return Err(EtlError::InvalidParameter(
                "recompute_passes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// SHA-256 of the JSON form of these parameters, used to tag run reports.
    pub fn params_hash_sha256(&self) -> Result<String, EtlError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| EtlError::InvalidParameter(e.to_string()))?;
        Ok(sha256_hex(&bytes))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
