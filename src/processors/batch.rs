//! Per-hole batch execution of the desurvey and composite pipelines.
//!
//! Holes are processed independently and in parallel with Rayon. Results are
//! concatenated in the order hole ids first appear in the input, so output is
//! identical regardless of the number of worker threads. A failing hole is
//! recorded in the batch report and never stops the other holes.

use std::collections::{HashMap, HashSet};

use log::{info, warn};
use rayon::prelude::*;

use crate::config::{CompositeConfig, DesurveyConfig, IntervalSpec, PipelineConfig, RunConfig, RunMode};
use crate::core::loaders::{
    CollarRecord, CompositeRow, DesurveyedSample, SourceInterval, SourceTable, SurveyStation,
};

use super::aggregate::{aggregate, validate_record};
use super::desurvey::{integrate, resample_at, resample_uniform};
use super::error::{ProcessingError, Result};
use super::partition::{partition, validate_spec, PartitionMode};

/// Outcome of one hole.
#[derive(Debug, Clone, PartialEq)]
pub enum HoleStatus {
    /// The hole produced `rows` output rows
    Processed { rows: usize },
    /// Nothing to produce (e.g. a collar without surveys); not an error
    NoData,
    /// The hole was rejected
    Failed(ProcessingError),
}

/// Per-hole entry of a batch report.
#[derive(Debug, Clone, PartialEq)]
pub struct HoleReport {
    pub hole_id: String,
    pub status: HoleStatus,
}

/// Concatenated output rows plus a report entry for every hole.
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    pub rows: Vec<T>,
    pub holes: Vec<HoleReport>,
}

impl<T> BatchResult<T> {
    /// Report entry for a hole, if it was part of the batch.
    pub fn report(&self, hole_id: &str) -> Option<&HoleReport> {
        self.holes.iter().find(|h| h.hole_id == hole_id)
    }

    /// Number of holes that produced output.
    pub fn processed_count(&self) -> usize {
        self.holes
            .iter()
            .filter(|h| matches!(h.status, HoleStatus::Processed { .. }))
            .count()
    }

    /// Number of holes without output and without error.
    pub fn no_data_count(&self) -> usize {
        self.holes
            .iter()
            .filter(|h| h.status == HoleStatus::NoData)
            .count()
    }

    /// Number of holes that failed.
    pub fn failed_count(&self) -> usize {
        self.holes
            .iter()
            .filter(|h| matches!(h.status, HoleStatus::Failed(_)))
            .count()
    }
}

/// Output of [`HoleBatchRunner::run`].
#[derive(Debug, Clone)]
pub enum BatchOutput {
    Desurvey(BatchResult<DesurveyedSample>),
    Composite {
        /// Field names, one per composite value column
        fields: Vec<String>,
        result: BatchResult<CompositeRow>,
    },
}

/// In-memory input tables for a run.
#[derive(Debug, Clone, Default)]
pub struct DrillholeData {
    pub collars: Vec<CollarRecord>,
    pub surveys: Vec<SurveyStation>,
    pub tables: Vec<SourceTable>,
}

/// Hole ids in first-seen order.
#[derive(Default)]
struct HoleOrder<'a> {
    order: Vec<&'a str>,
    seen: HashSet<&'a str>,
}

impl<'a> HoleOrder<'a> {
    fn add(&mut self, hole_id: &'a str) {
        if self.seen.insert(hole_id) {
            self.order.push(hole_id);
        }
    }
}

/// Group items by hole id, keeping input order within each hole.
fn group_by_hole<'a, T, F>(items: &'a [T], hole_id: F) -> HashMap<&'a str, Vec<&'a T>>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut groups: HashMap<&str, Vec<&T>> = HashMap::new();
    for item in items {
        groups.entry(hole_id(item)).or_default().push(item);
    }
    groups
}

/// Concatenate per-hole results in hole order.
fn collect_results<T>(results: Vec<(&str, Result<Vec<T>>)>) -> BatchResult<T> {
    let total: usize = results
        .iter()
        .map(|(_, r)| r.as_ref().map_or(0, |rows| rows.len()))
        .sum();

    let mut rows = Vec::with_capacity(total);
    let mut holes = Vec::with_capacity(results.len());

    for (hole_id, result) in results {
        let status = match result {
            Ok(hole_rows) if hole_rows.is_empty() => HoleStatus::NoData,
            Ok(hole_rows) => {
                let count = hole_rows.len();
                rows.extend(hole_rows);
                HoleStatus::Processed { rows: count }
            }
            Err(e) => {
                warn!("hole {}: {}", hole_id, e);
                HoleStatus::Failed(e)
            }
        };
        holes.push(HoleReport {
            hole_id: hole_id.to_string(),
            status,
        });
    }

    BatchResult { rows, holes }
}

fn missing_boundaries(hole_id: &str) -> ProcessingError {
    ProcessingError::InvalidInterval(format!("no boundary list for hole '{}'", hole_id))
}

/// Runs the desurvey and composite pipelines hole by hole.
#[derive(Debug, Clone, Default)]
pub struct HoleBatchRunner {
    pub desurvey: DesurveyConfig,
    pub composite: CompositeConfig,
}

impl HoleBatchRunner {
    pub fn new(desurvey: DesurveyConfig, composite: CompositeConfig) -> Self {
        Self { desurvey, composite }
    }

    /// Build a runner from the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.desurvey.clone(), config.composite.clone())
    }

    /// Execute the pipeline selected by `run` over `data`.
    ///
    /// # Errors
    ///
    /// Aborts with `InvalidInterval` for an invalid interval spec or a
    /// composite run without one, and with `EmptyInput` when there are no
    /// holes. Per-hole failures are reported in the result instead.
    pub fn run(&self, run: &RunConfig, data: &DrillholeData) -> Result<BatchOutput> {
        match run.mode {
            RunMode::Desurvey => {
                let result =
                    self.run_desurvey_with(&data.collars, &data.surveys, run.interval_spec.as_ref())?;
                Ok(BatchOutput::Desurvey(result))
            }
            RunMode::Composite => {
                let spec = run.interval_spec.as_ref().ok_or_else(|| {
                    ProcessingError::InvalidInterval("compositing requires an interval spec".to_string())
                })?;
                let result = self.run_composite(&data.tables, spec)?;
                let fields = data.tables.iter().map(|t| t.name.clone()).collect();
                Ok(BatchOutput::Composite { fields, result })
            }
        }
    }

    /// Desurvey every hole at its survey stations.
    pub fn run_desurvey(
        &self,
        collars: &[CollarRecord],
        surveys: &[SurveyStation],
    ) -> Result<BatchResult<DesurveyedSample>> {
        self.run_desurvey_with(collars, surveys, None)
    }

    /// Desurvey every hole, optionally resampling each path.
    ///
    /// `Uniform` resamples at a fixed depth interval; `Boundaries` and
    /// `HoleBoundaries` locate positions at the listed depths.
    pub fn run_desurvey_with(
        &self,
        collars: &[CollarRecord],
        surveys: &[SurveyStation],
        spec: Option<&IntervalSpec>,
    ) -> Result<BatchResult<DesurveyedSample>> {
        if let Some(spec) = spec {
            validate_spec(spec)?;
        }

        let mut holes = HoleOrder::default();
        let mut collar_by_hole: HashMap<&str, &CollarRecord> = HashMap::new();
        for collar in collars {
            holes.add(&collar.hole_id);
            if collar_by_hole.contains_key(collar.hole_id.as_str()) {
                warn!("hole {}: duplicate collar record ignored", collar.hole_id);
            } else {
                collar_by_hole.insert(&collar.hole_id, collar);
            }
        }
        for station in surveys {
            holes.add(&station.hole_id);
        }

        if holes.order.is_empty() {
            return Err(ProcessingError::EmptyInput);
        }

        let stations_by_hole = group_by_hole(surveys, |s| s.hole_id.as_str());

        let results: Vec<(&str, Result<Vec<DesurveyedSample>>)> = holes
            .order
            .par_iter()
            .map(|&hole_id| {
                let stations = stations_by_hole.get(hole_id).map(Vec::as_slice).unwrap_or(&[]);
                let result = match collar_by_hole.get(hole_id) {
                    Some(collar) => self.desurvey_hole(collar, stations, spec),
                    None => Err(ProcessingError::MissingCollar(hole_id.to_string())),
                };
                (hole_id, result)
            })
            .collect();

        let batch = collect_results(results);
        info!(
            "desurvey: {} holes, {} samples, {} without surveys, {} failed",
            batch.holes.len(),
            batch.rows.len(),
            batch.no_data_count(),
            batch.failed_count()
        );
        Ok(batch)
    }

    fn desurvey_hole(
        &self,
        collar: &CollarRecord,
        stations: &[&SurveyStation],
        spec: Option<&IntervalSpec>,
    ) -> Result<Vec<DesurveyedSample>> {
        let samples = integrate(collar, stations.iter().copied(), &self.desurvey)?;

        match spec {
            None => Ok(samples),
            Some(IntervalSpec::Uniform { length }) => resample_uniform(collar, &samples, *length),
            Some(IntervalSpec::Boundaries(depths)) => Ok(resample_at(collar, &samples, depths)),
            Some(IntervalSpec::HoleBoundaries(map)) => {
                if samples.is_empty() {
                    return Ok(samples);
                }
                let depths = map
                    .get(&collar.hole_id)
                    .ok_or_else(|| missing_boundaries(&collar.hole_id))?;
                Ok(resample_at(collar, &samples, depths))
            }
        }
    }

    /// Composite every table onto the target intervals of each hole.
    ///
    /// Each hole's partition covers the combined depth range of its records
    /// across all tables (uniform mode) or the supplied boundaries. Output rows
    /// carry one value per table, in table order.
    pub fn run_composite(
        &self,
        tables: &[SourceTable],
        spec: &IntervalSpec,
    ) -> Result<BatchResult<CompositeRow>> {
        validate_spec(spec)?;

        let mut holes = HoleOrder::default();
        for table in tables {
            for record in &table.records {
                holes.add(&record.hole_id);
            }
        }
        // Holes with boundaries but no data still get (empty) composites
        if let IntervalSpec::HoleBoundaries(map) = spec {
            let mut extra: Vec<&str> = map
                .keys()
                .map(String::as_str)
                .filter(|h| !holes.seen.contains(h))
                .collect();
            extra.sort_unstable();
            for hole_id in extra {
                holes.add(hole_id);
            }
        }

        if holes.order.is_empty() {
            return Err(ProcessingError::EmptyInput);
        }

        let grouped: Vec<HashMap<&str, Vec<&SourceInterval>>> = tables
            .iter()
            .map(|t| group_by_hole(&t.records, |r| r.hole_id.as_str()))
            .collect();

        let results: Vec<(&str, Result<Vec<CompositeRow>>)> = holes
            .order
            .par_iter()
            .map(|&hole_id| {
                let per_table: Vec<&[&SourceInterval]> = grouped
                    .iter()
                    .map(|g| g.get(hole_id).map(Vec::as_slice).unwrap_or(&[]))
                    .collect();
                (hole_id, self.composite_hole(hole_id, tables, &per_table, spec))
            })
            .collect();

        let batch = collect_results(results);
        info!(
            "composite: {} holes, {} intervals, {} fields, {} failed",
            batch.holes.len(),
            batch.rows.len(),
            tables.len(),
            batch.failed_count()
        );
        Ok(batch)
    }

    fn composite_hole(
        &self,
        hole_id: &str,
        tables: &[SourceTable],
        per_table: &[&[&SourceInterval]],
        spec: &IntervalSpec,
    ) -> Result<Vec<CompositeRow>> {
        for (table, records) in tables.iter().zip(per_table) {
            for record in records.iter() {
                validate_record(record, table.kind)?;
            }
        }

        let targets = match spec {
            IntervalSpec::Uniform { length } => {
                let range = per_table
                    .iter()
                    .flat_map(|records| records.iter())
                    .fold(None, |acc: Option<(f64, f64)>, r| {
                        Some(match acc {
                            Some((lo, hi)) => (lo.min(r.depth_start), hi.max(r.depth_end)),
                            None => (r.depth_start, r.depth_end),
                        })
                    });
                match range {
                    Some(range) => partition(range, PartitionMode::Uniform(*length))?,
                    None => Vec::new(),
                }
            }
            IntervalSpec::Boundaries(list) => partition((0.0, 0.0), PartitionMode::Boundaries(list))?,
            IntervalSpec::HoleBoundaries(map) => {
                let list = map.get(hole_id).ok_or_else(|| missing_boundaries(hole_id))?;
                partition((0.0, 0.0), PartitionMode::Boundaries(list))?
            }
        };

        let columns = tables
            .iter()
            .zip(per_table)
            .map(|(table, records)| {
                aggregate(
                    records.iter().copied(),
                    &targets,
                    table.kind,
                    self.composite.min_coverage,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = targets
            .iter()
            .enumerate()
            .map(|(i, &(start, end))| CompositeRow {
                hole_id: hole_id.to_string(),
                interval_start: start,
                interval_end: end,
                values: columns.iter().map(|col| col[i].clone()).collect(),
            })
            .collect();

        Ok(rows)
    }
}
