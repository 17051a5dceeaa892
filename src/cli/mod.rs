//! Command-line interface for the drillhole pipeline.

use anyhow::{bail, ensure, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{ColumnConfig, DipConvention, IntervalSpec, StationOrder};
use crate::core::loaders::{
    load_collars_csv, load_interval_extents_csv, load_intervals_csv, load_surveys_csv, SourceTable,
};
use crate::core::writers::{write_composite_csv, write_desurvey_csv, write_hole_report_csv};
use crate::processors::batch::{BatchResult, HoleBatchRunner};
use crate::processors::partition::boundaries_from_intervals;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "drillhole-pipeline")]
#[command(about = "Drillhole desurveying and interval compositing pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Worker threads for per-hole processing (overrides config)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Dip sign convention of the survey table.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum DipArg {
    /// -90 points straight down
    NegativeDown,
    /// +90 points straight down
    PositiveDown,
}

impl From<DipArg> for DipConvention {
    fn from(arg: DipArg) -> Self {
        match arg {
            DipArg::NegativeDown => DipConvention::NegativeDown,
            DipArg::PositiveDown => DipConvention::PositiveDown,
        }
    }
}

#[derive(Args)]
struct DesurveyArgs {
    /// Collar CSV (hole id, eastings, northings, RL)
    collars: PathBuf,
    /// Survey CSV (hole id, depth, azimuth, dip)
    surveys: PathBuf,
    /// Output CSV of desurveyed positions
    output: PathBuf,
    /// Resample each path every N metres instead of at survey stations
    #[arg(long, conflicts_with = "depths")]
    interval: Option<f64>,
    /// Resample each path at these depths (at least two, comma separated)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    depths: Option<Vec<f64>>,
    /// Dip sign convention (overrides config)
    #[arg(long, value_enum)]
    dip_convention: Option<DipArg>,
    /// Fail holes whose survey stations are not in ascending depth order
    #[arg(long)]
    reject_unordered: bool,
    /// Write a per-hole status report to this CSV
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("partition")
        .required(true)
        .args(["length", "boundaries", "boundaries_from"])
))]
struct CompositeArgs {
    /// Output CSV of composites
    output: PathBuf,
    /// Interval or point-sample CSV files to composite
    #[arg(short, long, required = true, num_args = 1..)]
    data: Vec<PathBuf>,
    /// Uniform composite length in metres
    #[arg(long)]
    length: Option<f64>,
    /// Composite boundaries applied to every hole (comma separated)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    boundaries: Option<Vec<f64>>,
    /// Use the intervals of an existing table as per-hole boundaries
    #[arg(long)]
    boundaries_from: Option<PathBuf>,
    /// Minimum covered fraction for a composite to carry a value (overrides config)
    #[arg(long)]
    min_coverage: Option<f64>,
    /// Value columns to composite (comma separated, overrides config)
    #[arg(long, value_delimiter = ',', conflicts_with = "all_values")]
    values: Option<Vec<String>>,
    /// Composite every column other than hole id and depths
    #[arg(long)]
    all_values: bool,
    /// Value columns to composite as categories (comma separated)
    #[arg(long, value_delimiter = ',')]
    categorical: Vec<String>,
    /// Write a per-hole status report to this CSV
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct 3D hole paths from collar and survey tables
    Desurvey(DesurveyArgs),

    /// Composite interval data onto uniform or supplied depth intervals
    Composite(CompositeArgs),
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Run `f` behind a spinner, clearing it whatever the outcome.
fn with_spinner<T>(message: &str, f: impl FnOnce(&ProgressBar) -> Result<T>) -> Result<T> {
    let spinner = create_spinner(message);
    let outcome = f(&spinner);
    spinner.finish_and_clear();
    outcome
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Size the global rayon pool used for per-hole processing.
fn configure_threads(threads: Option<usize>) {
    if let Some(n) = threads {
        match rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            Ok(()) => info!("Using {} worker threads", n),
            Err(e) => warn!("Failed to configure {} worker threads: {}", n, e),
        }
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    if cli.threads.is_some() {
        config.processing.threads = cli.threads;
    }
    configure_threads(config.processing.threads);

    // Dispatch to subcommands
    let outcome = match &cli.command {
        Commands::Desurvey(args) => cmd_desurvey(args, &config),
        Commands::Composite(args) => cmd_composite(args, &config),
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn warn_failures<T>(result: &BatchResult<T>, report: Option<&PathBuf>) {
    let failed = result.failed_count();
    if failed == 0 {
        return;
    }
    match report {
        Some(path) => warn!("{} hole(s) failed; see {}", failed, path.display()),
        None => warn!("{} hole(s) failed; rerun with --report for details", failed),
    }
}

fn write_report<T>(result: &BatchResult<T>, report: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = report {
        write_hole_report_csv(path, &result.holes)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!("Wrote hole report to {}", path.display());
    }
    Ok(())
}

fn cmd_desurvey(args: &DesurveyArgs, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    let mut desurvey = config.desurvey.clone();
    if let Some(dip) = args.dip_convention {
        desurvey.dip_convention = dip.into();
    }
    if args.reject_unordered {
        desurvey.station_order = StationOrder::Reject;
    }

    let spec = match (args.interval, &args.depths) {
        (Some(length), _) => Some(IntervalSpec::Uniform { length }),
        (None, Some(depths)) => {
            let mut depths = depths.clone();
            depths.sort_by(f64::total_cmp);
            depths.dedup();
            Some(IntervalSpec::Boundaries(depths))
        }
        (None, None) => None,
    };

    println!("Desurveying drillholes...");
    println!("Collars: {}", args.collars.display());
    println!("Surveys: {}", args.surveys.display());
    println!("Output: {}", args.output.display());

    let runner = HoleBatchRunner::new(desurvey, config.composite.clone());

    let result = with_spinner("Loading collar and survey tables...", |spinner| {
        let collars = load_collars_csv(&args.collars, &config.columns)
            .with_context(|| format!("failed to load collars from {}", args.collars.display()))?;
        let surveys = load_surveys_csv(&args.surveys, &config.columns)
            .with_context(|| format!("failed to load surveys from {}", args.surveys.display()))?;
        info!("Loaded {} collars and {} survey stations", collars.len(), surveys.len());

        spinner.set_message("Desurveying holes...");
        let result = runner
            .run_desurvey_with(&collars, &surveys, spec.as_ref())
            .context("desurvey failed")?;

        spinner.set_message("Writing output...");
        write_desurvey_csv(&args.output, &result.rows, config.output.precision)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        write_report(&result, args.report.as_ref())?;

        Ok(result)
    })?;

    warn_failures(&result, args.report.as_ref());

    let resampling = match &spec {
        Some(IntervalSpec::Uniform { length }) => format!("every {} m", length),
        Some(IntervalSpec::Boundaries(depths)) => format!("{} depths", depths.len()),
        Some(IntervalSpec::HoleBoundaries(map)) => format!("{} hole lists", map.len()),
        None => "survey stations".to_string(),
    };

    print_summary(
        "Desurvey Complete",
        &[
            ("Output file", args.output.display().to_string()),
            ("Positions", resampling),
            ("Holes", result.holes.len().to_string()),
            ("Samples written", result.rows.len().to_string()),
            ("Without surveys", result.no_data_count().to_string()),
            ("Failed holes", result.failed_count().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

/// First of `<name> (<stem>)`, `<name> (<stem> 2)`, ... not already taken.
fn unique_field_name(name: &str, stem: &str, taken: &HashSet<String>) -> String {
    let mut candidate = format!("{} ({})", name, stem);
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{} ({} {})", name, stem, n);
        n += 1;
    }
    candidate
}

/// Load every data file, renaming fields that repeat an earlier name.
fn load_tables(
    paths: &[PathBuf],
    columns: &ColumnConfig,
    categorical: &[String],
) -> Result<Vec<SourceTable>> {
    let mut tables: Vec<SourceTable> = Vec::new();
    let mut names: HashSet<String> = HashSet::new();

    for path in paths {
        let loaded = load_intervals_csv(path, columns, categorical)
            .with_context(|| format!("failed to load intervals from {}", path.display()))?;

        for mut table in loaded {
            if names.contains(&table.name) {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "data".to_string());
                let renamed = unique_field_name(&table.name, &stem, &names);
                warn!("Field '{}' appears more than once; renamed to '{}'", table.name, renamed);
                table.name = renamed;
            }
            info!(
                "Field '{}' from {}: {} intervals, {:?}",
                table.name,
                path.display(),
                table.len(),
                table.kind
            );
            names.insert(table.name.clone());
            tables.push(table);
        }
    }

    Ok(tables)
}

fn cmd_composite(args: &CompositeArgs, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    let mut composite = config.composite.clone();
    if let Some(min_coverage) = args.min_coverage {
        composite.min_coverage = min_coverage;
    }
    ensure!(
        (0.0..=1.0).contains(&composite.min_coverage),
        "min coverage must be between 0 and 1, got {}",
        composite.min_coverage
    );
    composite.categorical_columns.extend(args.categorical.iter().cloned());

    let mut columns = config.columns.clone();
    if let Some(values) = &args.values {
        columns.values = values.clone();
    } else if args.all_values {
        columns.values.clear();
    }

    println!("Compositing interval data...");
    for path in &args.data {
        println!("Input: {}", path.display());
    }
    println!("Output: {}", args.output.display());

    let runner = HoleBatchRunner::new(config.desurvey.clone(), composite.clone());

    let (fields, spec, result) = with_spinner("Loading interval tables...", |spinner| {
        let tables = load_tables(&args.data, &columns, &composite.categorical_columns)?;
        if tables.is_empty() {
            bail!("no value columns found in the data files");
        }

        let spec = if let Some(length) = args.length {
            IntervalSpec::Uniform { length }
        } else if let Some(boundaries) = &args.boundaries {
            IntervalSpec::Boundaries(boundaries.clone())
        } else if let Some(path) = &args.boundaries_from {
            let extents = load_interval_extents_csv(path, &config.columns)
                .with_context(|| format!("failed to load boundaries from {}", path.display()))?;
            let map = boundaries_from_intervals(&extents);
            info!("Derived boundaries for {} holes from {}", map.len(), path.display());
            IntervalSpec::HoleBoundaries(map)
        } else {
            bail!("one of --length, --boundaries or --boundaries-from is required");
        };

        spinner.set_message("Compositing holes...");
        let result = runner
            .run_composite(&tables, &spec)
            .context("compositing failed")?;

        let fields: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();

        spinner.set_message("Writing output...");
        write_composite_csv(&args.output, &fields, &result.rows, config.output.precision)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        write_report(&result, args.report.as_ref())?;

        Ok((fields, spec, result))
    })?;

    warn_failures(&result, args.report.as_ref());

    let partition = match &spec {
        IntervalSpec::Uniform { length } => format!("uniform {} m", length),
        IntervalSpec::Boundaries(list) => format!("{} boundaries", list.len()),
        IntervalSpec::HoleBoundaries(map) => format!("per-hole ({} holes)", map.len()),
    };

    print_summary(
        "Compositing Complete",
        &[
            ("Output file", args.output.display().to_string()),
            ("Fields", fields.join(", ")),
            ("Partition", partition),
            ("Holes", result.holes.len().to_string()),
            ("Composites written", result.rows.len().to_string()),
            ("Failed holes", result.failed_count().to_string()),
            ("Min coverage", composite.min_coverage.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}
