//! Stage orchestration: per-dataset cleaning and the final merge.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::filter;
use crate::kinematics;
use crate::merge::{merge, UnifiedRecord};
use crate::quality;
use crate::record::{Dataset, EnrichedFix, TrackFix};
use crate::report::{DatasetReport, PassReport, RunReport};
use crate::timestamp;
use crate::{EtlError, Params};

#[derive(Clone, Debug)]
pub struct CleanedDataset {
    pub name: String,
    /// Track-ordered, enriched and taxonomy-normalised fixes.
    pub fixes: Vec<EnrichedFix>,
    pub report: DatasetReport,
}

#[derive(Clone, Debug)]
pub struct RunOutput {
    pub table: Vec<UnifiedRecord>,
    pub report: RunReport,
}

/// Runs every cleaning stage over one dataset.
///
/// Kinematics, zero-interval removal and outlier removal run
/// `params.recompute_passes` times (two by default). Removing a fix changes
/// its successor's predecessor, so the second pass refreshes the values the
/// first one made stale. Fixes that only become implausible after the last
/// pass are not removed; they are counted in
/// [`DatasetReport::residual_outliers`].
pub fn clean_dataset(dataset: Dataset, params: &Params) -> Result<CleanedDataset, EtlError> {
    params.validate()?;
    let Dataset { name, records } = dataset;
    let mut report = DatasetReport::new(&name, records.len());
    debug!(dataset = %name, records = records.len(), "cleaning dataset");

    let (checked, quality) = quality::filter(records);
    report.missing_dropped = quality.missing_dropped;
    report.duplicates_dropped = quality.duplicates_dropped;
    debug!(
        dataset = %name,
        missing = quality.missing_dropped,
        duplicates = quality.duplicates_dropped,
        "quality filter"
    );

    let (timed, unparsable) = timestamp::normalize(checked);
    report.unparsable_timestamps = unparsable;
    if unparsable > 0 {
        warn!(dataset = %name, unparsable, "unparsable timestamps dropped");
    }
    let (ordered, _) = timestamp::drop_unordered(timed);

    let mut enriched = run_pass(&name, ordered, params, 1, &mut report);
    for pass in 2..=params.recompute_passes {
        let fixes: Vec<TrackFix> = enriched.into_iter().map(EnrichedFix::into_fix).collect();
        enriched = run_pass(&name, fixes, params, pass, &mut report);
    }

    report.residual_outliers = kinematics::count_residual_outliers(
        &enriched,
        params.distance_model,
        params.max_speed_mps,
    );
    if report.residual_outliers > 0 {
        debug!(
            dataset = %name,
            residual = report.residual_outliers,
            "fixes above the speed threshold remain after the final pass"
        );
    }

    let (fixes, taxonomy) = params.taxonomy.apply(&name, enriched);
    report.species_filled = taxonomy.filled;
    report.species_renamed = taxonomy.renamed;
    report.tracks = fixes.chunk_by(|a, b| a.fix.same_track(&b.fix)).count();
    report.output_records = fixes.len();

    info!(
        dataset = %name,
        input = report.input_records,
        output = report.output_records,
        tracks = report.tracks,
        "dataset cleaned"
    );

    Ok(CleanedDataset {
        name,
        fixes,
        report,
    })
}

fn run_pass(
    dataset: &str,
    fixes: Vec<TrackFix>,
    params: &Params,
    pass: usize,
    report: &mut DatasetReport,
) -> Vec<EnrichedFix> {
    let input_records = fixes.len();
    let enriched = kinematics::compute(fixes, params.distance_model);
    let undefined_distances = enriched
        .iter()
        .filter(|e| e.kinematics.distance_m.is_none())
        .count();
    if undefined_distances > 0 {
        warn!(dataset, pass, undefined_distances, "distance undefined for some fixes");
    }

    let (kept, zero_interval_removed) = filter::drop_zero_intervals(enriched);
    let (kept, outliers) = filter::drop_outliers(kept, params.max_speed_mps);
    info!(
        dataset,
        pass,
        zero_interval = zero_interval_removed,
        outliers = outliers.removed,
        "retained {:.2}% of fixes after outlier removal",
        outliers.retained_pct
    );

    report.passes.push(PassReport {
        pass,
        input_records,
        undefined_distances,
        zero_interval_removed,
        outliers_removed: outliers.removed,
        retained_pct: outliers.retained_pct,
    });
    kept
}

/// Cleans every dataset (in parallel, one worker per dataset) and merges the
/// results in input order. Any dataset failing aborts the run.
pub fn run(datasets: Vec<Dataset>, params: &Params) -> Result<RunOutput, EtlError> {
    params.validate()?;
    let mut names = HashSet::with_capacity(datasets.len());
    for dataset in &datasets {
        if !names.insert(dataset.name.as_str()) {
            return Err(EtlError::DuplicateDataset(dataset.name.clone()));
        }
    }

    let cleaned: Vec<CleanedDataset> = datasets
        .into_par_iter()
        .map(|dataset| clean_dataset(dataset, params))
        .collect::<Result<Vec<_>, _>>()?;

    let (parts, reports): (Vec<_>, Vec<_>) = cleaned
        .into_iter()
        .map(|c| ((c.name, c.fixes), c.report))
        .unzip();
    let expected: usize = parts.iter().map(|(_, fixes)| fixes.len()).sum();
    let table = merge(parts);
    debug_assert_eq!(table.len(), expected);

    let report = RunReport::new(params, reports)?;
    info!(
        datasets = report.datasets.len(),
        input = report.input_records,
        output = report.output_records,
        residual_outliers = report.residual_outliers,
        "merged {} rows",
        table.len()
    );
    Ok(RunOutput { table, report })
}
