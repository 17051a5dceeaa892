//! Drillhole desurveying and interval compositing pipeline.
//!
//! This crate provides tools for:
//! - Loading collar, survey and interval tables from CSV
//! - Reconstructing 3D hole trajectories from survey stations (desurveying)
//! - Resampling trajectories at uniform or listed depths
//! - Length-weighted compositing of interval data onto uniform or supplied
//!   depth partitions (parallel across holes)
//!
//! # Example
//!
//! ```no_run
//! use drillhole_pipeline::core::loaders::{load_collars_csv, load_surveys_csv};
//! use drillhole_pipeline::{HoleBatchRunner, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let collars = load_collars_csv("collars.csv", &config.columns).unwrap();
//! let surveys = load_surveys_csv("surveys.csv", &config.columns).unwrap();
//! let result = HoleBatchRunner::from_config(&config)
//!     .run_desurvey(&collars, &surveys)
//!     .unwrap();
//! println!("{} samples", result.rows.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{IntervalSpec, PipelineConfig, RunConfig, RunMode};
pub use core::loaders::{CollarRecord, DesurveyedSample, SourceTable, SurveyStation};
pub use processors::{BatchResult, HoleBatchRunner, HoleStatus, ProcessingError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
