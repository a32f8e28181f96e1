use std::fmt::Write as _;
use std::fs;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use track_etl::{
    dataset_name_from_path, diagnose, read_dataset, run, Dataset, DatasetDiagnostics,
    DistanceModel, Params, UnifiedRecord, UNIFIED_COLUMNS,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Animal-tracking trajectory cleaning CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean every CSV study export in a directory and merge them into one table
    Run(RunArgs),
    /// Inspect raw CSV exports for missing fields, bad timestamps and track counts
    Diagnose(DiagnoseArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Directory holding one CSV export per study
    #[arg(value_hint = ValueHint::DirPath)]
    source_dir: PathBuf,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "combined_cleaned_data.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Write the run report as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Parameter JSON (speed threshold, distance model, passes, taxonomy rules)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Speed threshold in m/s; faster fixes are removed
    #[arg(long)]
    max_speed: Option<f64>,

    /// Distance model for kinematics
    #[arg(long, value_enum)]
    distance_model: Option<DistanceModelOpt>,

    /// Number of kinematics/filter passes
    #[arg(long)]
    passes: Option<usize>,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Log per-stage timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct DiagnoseArgs {
    /// CSV exports to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Report path (`-` for stdout)
    #[arg(short, long, default_value = "track_diagnostics.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DistanceModelOpt {
    GreatCircle,
    Ellipsoidal,
}

impl From<DistanceModelOpt> for DistanceModel {
    fn from(value: DistanceModelOpt) -> Self {
        match value {
            DistanceModelOpt::GreatCircle => DistanceModel::GreatCircle,
            DistanceModelOpt::Ellipsoidal => DistanceModel::Ellipsoidal,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Run(args) => args.verbose,
        Command::Diagnose(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Diagnose(args) => handle_diagnose(args),
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let mut params = match args.config.as_ref() {
        Some(path) => load_params(path)?,
        None => Params::default(),
    };
    if let Some(max_speed) = args.max_speed {
        params.max_speed_mps = max_speed;
    }
    if let Some(model) = args.distance_model {
        params.distance_model = model.into();
    }
    if let Some(passes) = args.passes {
        params.recompute_passes = passes;
    }
    params.validate()?;

    let t_read = Instant::now();
    let paths = discover_csv_files(&args.source_dir)?;
    if paths.is_empty() {
        warn!("no CSV files found in {}", args.source_dir.display());
    }
    let datasets: Vec<Dataset> = paths
        .par_iter()
        .map(|path| load_dataset(path))
        .collect::<Result<Vec<_>>>()?;
    if args.profile || args.verbose {
        info!(
            "Read stage: {:.1} ms ({} files)",
            t_read.elapsed().as_secs_f64() * 1000.0,
            datasets.len()
        );
    }

    let t_clean = Instant::now();
    let output = run(datasets, &params)?;
    if args.profile || args.verbose {
        info!(
            "Clean stage: {:.1} ms ({} rows)",
            t_clean.elapsed().as_secs_f64() * 1000.0,
            output.table.len()
        );
    }
    for dataset in &output.report.datasets {
        if dataset.residual_outliers > 0 {
            warn!(
                "{}: {} fixes still exceed {} m/s after {} passes ({:.3}% of input)",
                dataset.dataset,
                dataset.residual_outliers,
                params.max_speed_mps,
                params.recompute_passes,
                dataset.residual_fraction() * 100.0
            );
        }
    }

    let t_csv = Instant::now();
    if args.output.as_os_str() == "-" {
        write_table_stdout(&output.table)?;
    } else {
        write_table_csv(&output.table, &args.output)?;
        info!("Wrote cleaned table: {}", args.output.display());
    }
    if args.profile || args.verbose {
        info!(
            "CSV stage: {:.1} ms ({} rows)",
            t_csv.elapsed().as_secs_f64() * 1000.0,
            output.table.len()
        );
    }

    if let Some(path) = args.report.as_ref() {
        let text = serde_json::to_string_pretty(&output.report)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote run report: {}", path.display());
    }

    info!(
        "Run complete: {} datasets, {} of {} records kept, params {}",
        output.report.datasets.len(),
        output.report.output_records,
        output.report.input_records,
        &output.report.params_hash[..12]
    );
    Ok(())
}

fn handle_diagnose(args: DiagnoseArgs) -> Result<()> {
    let mut report = String::new();
    for path in &args.inputs {
        let dataset = load_dataset(path)?;
        let diag = diagnose(&dataset);
        render_diagnostics(&mut report, path, &diag);
    }

    if args.output.as_os_str() == "-" {
        io::stdout()
            .lock()
            .write_all(report.as_bytes())
            .context("failed to write report to stdout")?;
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Diagnostic report written: {}", args.output.display());
    }
    Ok(())
}

fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("source directory {} does not exist", dir.display()));
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = dataset_name_from_path(path);
    let dataset = read_dataset(&name, BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))?;
    debug!(
        "Loaded {} records from {} as '{}'",
        dataset.records.len(),
        path.display(),
        name
    );
    Ok(dataset)
}

fn load_params(path: &Path) -> Result<Params> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let params: Params = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid parameter file", path.display()))?;
    Ok(params)
}

fn write_table_stdout(table: &[UnifiedRecord]) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_table_rows(table, &mut writer)
}

fn write_table_csv(table: &[UnifiedRecord], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_table_rows(table, &mut writer)
}

fn write_table_rows<W: Write>(table: &[UnifiedRecord], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(UNIFIED_COLUMNS)?;
    for row in table {
        writer.write_record([
            row.study_tag_id.clone(),
            format_timestamp(&row.timestamp),
            row.location_lat.to_string(),
            row.location_lon.to_string(),
            format_optional(row.distance_from_prev_m, 3),
            format!("{:.3}", row.time_diff_s),
            format_optional(row.speed_mps, 4),
            row.individual_local_identifier.clone(),
            row.tag_local_identifier.clone(),
            row.individual_taxon_canonical_name.clone().unwrap_or_default(),
            row.study_name.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `YYYY-MM-DD HH:MM:SS`, with fractional seconds only when present.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

fn format_optional(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(String::new, |v| format!("{:.*}", decimals, v))
}

fn render_diagnostics(out: &mut String, path: &Path, diag: &DatasetDiagnostics) {
    let _ = writeln!(out, "FILE: {}", path.display());
    let _ = writeln!(out, "  dataset: {}", diag.dataset);
    let _ = writeln!(out, "  records: {}", diag.records);
    let _ = writeln!(out, "  incomplete_records: {}", diag.incomplete_records);
    out.push_str("  missing:\n");
    for (column, count) in &diag.missing {
        let _ = writeln!(out, "    - {}: {}", column, count);
    }
    let _ = writeln!(out, "  unparsable_timestamps: {}", diag.unparsable_timestamps);
    let _ = writeln!(out, "  individuals: {}", diag.individuals);
    let _ = writeln!(out, "  tracks: {}", diag.tracks);
    if let (Some(first), Some(last)) = (diag.first_timestamp, diag.last_timestamp) {
        let _ = writeln!(
            out,
            "  timespan: {} .. {} ({:.1} days)",
            format_timestamp(&first),
            format_timestamp(&last),
            (last - first).num_seconds() as f64 / 86_400.0
        );
    }
    if !diag.species.is_empty() || diag.records_without_species > 0 {
        out.push_str("  species:\n");
        let mut pairs: Vec<_> = diag.species.iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(a.1));
        for (name, count) in pairs {
            let _ = writeln!(out, "    - {}: {}", name, count);
        }
        if diag.records_without_species > 0 {
            let _ = writeln!(out, "    - (missing): {}", diag.records_without_species);
        }
    }
    if !diag.passthrough_columns.is_empty() {
        let _ = writeln!(
            out,
            "  passthrough_columns: {}",
            diag.passthrough_columns.join(", ")
        );
    }
    out.push('\n');
}
