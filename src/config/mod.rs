//! Configuration types for the drillhole pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur while reading or writing configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Sign convention for survey dip readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DipConvention {
    /// -90 degrees points straight down
    #[default]
    NegativeDown,
    /// +90 degrees points straight down
    PositiveDown,
}

/// What to do with survey stations that are not listed in ascending depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationOrder {
    /// Stably sort the stations by depth before integrating
    #[default]
    Sort,
    /// Fail the hole with `UnorderedStations`
    Reject,
}

/// Target depth partitioning used by compositing, or the resampling depths
/// used by desurveying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalSpec {
    /// Contiguous bins of a fixed length
    Uniform { length: f64 },
    /// A single boundary list applied to every hole
    Boundaries(Vec<f64>),
    /// A boundary list per hole id
    HoleBoundaries(HashMap<String, Vec<f64>>),
}

/// Which pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Desurvey,
    Composite,
}

/// Per-call run selection handed to the batch runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: RunMode,

    /// Composite partition, or desurvey resampling depths. `None` desurveys at
    /// the survey stations and is invalid for compositing. Written in YAML as
    /// a single-key map, e.g. `uniform: {length: 2.0}`.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub interval_spec: Option<IntervalSpec>,
}

/// Column names for the collar, survey and interval tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_hole_id")]
    pub hole_id: String,

    #[serde(default = "default_eastings")]
    pub eastings: String,

    #[serde(default = "default_northings")]
    pub northings: String,

    #[serde(default = "default_rl")]
    pub rl: String,

    #[serde(default = "default_survey_depth")]
    pub survey_depth: String,

    #[serde(default = "default_azimuth")]
    pub azimuth: String,

    #[serde(default = "default_dip")]
    pub dip: String,

    /// Interval start column in source tables
    #[serde(default = "default_from")]
    pub from: String,

    /// Interval end column in source tables
    #[serde(default = "default_to")]
    pub to: String,

    /// Single-depth column, used when `from`/`to` are absent
    #[serde(default = "default_depth")]
    pub depth: String,

    /// Value columns to composite. Empty means every other column.
    #[serde(default = "default_value_columns")]
    pub values: Vec<String>,
}

fn default_hole_id() -> String {
    "Hole ID".to_string()
}

fn default_eastings() -> String {
    "Eastings".to_string()
}

fn default_northings() -> String {
    "Northings".to_string()
}

fn default_rl() -> String {
    "Relative Sea Level (RL)".to_string()
}

fn default_survey_depth() -> String {
    "Survey Depth".to_string()
}

fn default_azimuth() -> String {
    "Azimuth".to_string()
}

fn default_dip() -> String {
    "Dip".to_string()
}

fn default_from() -> String {
    "From".to_string()
}

fn default_to() -> String {
    "To".to_string()
}

fn default_depth() -> String {
    "Depth".to_string()
}

fn default_value_columns() -> Vec<String> {
    vec!["Value".to_string()]
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            hole_id: default_hole_id(),
            eastings: default_eastings(),
            northings: default_northings(),
            rl: default_rl(),
            survey_depth: default_survey_depth(),
            azimuth: default_azimuth(),
            dip: default_dip(),
            from: default_from(),
            to: default_to(),
            depth: default_depth(),
            values: default_value_columns(),
        }
    }
}

/// Configuration for trajectory reconstruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesurveyConfig {
    #[serde(default)]
    pub dip_convention: DipConvention,

    #[serde(default)]
    pub station_order: StationOrder,
}

/// Configuration for interval compositing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Minimum covered fraction of a composite for it to carry a value
    #[serde(default)]
    pub min_coverage: f64,

    /// Value columns treated as categorical even when they parse as numbers
    #[serde(default)]
    pub categorical_columns: Vec<String>,
}

/// Configuration for batch execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Worker threads for per-hole processing (None = rayon default)
    #[serde(default)]
    pub threads: Option<usize>,
}

/// Configuration for written tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Decimal places for numeric output
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_precision() -> usize {
    6
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub desurvey: DesurveyConfig,

    #[serde(default)]
    pub composite: CompositeConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
