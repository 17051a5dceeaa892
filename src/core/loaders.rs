//! Record types and CSV loaders for drillhole tables.
//!
//! This module provides:
//! - The record types shared by the desurvey and compositing engines
//! - Collar and survey table parsers
//! - Interval (lithology/assay) table parsers, accepting either from/to
//!   columns or a single depth column

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use thiserror::Error;

use super::transforms::point_depths_to_intervals;
use crate::config::ColumnConfig;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns in {source_name}: {columns}")]
    MissingColumns { source_name: String, columns: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Surface reference coordinate of a hole.
#[derive(Debug, Clone, PartialEq)]
pub struct CollarRecord {
    pub hole_id: String,
    pub eastings: f64,
    pub northings: f64,
    /// Relative level of the collar
    pub rl: f64,
}

/// A single directional survey reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyStation {
    pub hole_id: String,
    /// Distance along the hole from the collar
    pub depth: f64,
    /// Degrees from north
    pub azimuth: f64,
    /// Degrees, sign per [`crate::config::DipConvention`]
    pub dip: f64,
}

/// A 3D position along a desurveyed hole.
#[derive(Debug, Clone, PartialEq)]
pub struct DesurveyedSample {
    pub hole_id: String,
    pub depth: f64,
    pub eastings: f64,
    pub northings: f64,
    pub rl: f64,
}

/// Value carried by a source interval or produced by compositing.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Numeric(f64),
    Categorical(String),
}

/// How a value column is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Length-weighted mean
    Numeric,
    /// Length-weighted mode
    Categorical,
}

/// A depth interval of source data.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInterval {
    pub hole_id: String,
    pub depth_start: f64,
    pub depth_end: f64,
    /// `None` for empty cells
    pub value: Option<SampleValue>,
}

/// One value column of interval data across all holes.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Field name used for the output column
    pub name: String,
    pub kind: ValueKind,
    pub records: Vec<SourceInterval>,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, kind: ValueKind, records: Vec<SourceInterval>) -> Self {
        Self {
            name: name.into(),
            kind,
            records,
        }
    }

    /// Returns the number of records in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table has no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregated value of one field over a composite interval.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeValue {
    /// `None` when coverage is zero or below the configured minimum
    pub value: Option<SampleValue>,
    /// Total source length overlapping the interval
    pub coverage: f64,
}

/// One composite interval of one hole, with a value per field.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRow {
    pub hole_id: String,
    pub interval_start: f64,
    pub interval_end: f64,
    /// One entry per source table, in table order
    pub values: Vec<CompositeValue>,
}

/// Build a lowercase header -> index map.
fn header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect()
}

/// Resolve required columns, reporting every missing one at once.
fn require_columns(
    col_map: &HashMap<String, usize>,
    names: &[&str],
    source_name: &str,
) -> Result<Vec<usize>> {
    let mut indices = Vec::with_capacity(names.len());
    let mut missing = Vec::new();

    for name in names {
        match col_map.get(&name.to_lowercase()) {
            Some(&idx) => indices.push(idx),
            None => missing.push(*name),
        }
    }

    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns {
            source_name: source_name.to_string(),
            columns: missing.join(", "),
        });
    }

    Ok(indices)
}

/// Parse a numeric cell. Unparseable cells become NaN so the engine rejects
/// the owning hole rather than the whole file.
fn parse_number(record: &StringRecord, idx: usize, column: &str, line: u64) -> f64 {
    let raw = record.get(idx).unwrap_or("");
    match raw.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            warn!("line {}: invalid number '{}' in column '{}'", line, raw, column);
            f64::NAN
        }
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Extract a trimmed hole id, skipping rows without one.
fn hole_id_of(record: &StringRecord, idx: usize) -> Option<String> {
    let id = record.get(idx).unwrap_or("").trim();
    if id.is_empty() {
        warn!("line {}: row without hole id skipped", line_of(record));
        None
    } else {
        Some(id.to_string())
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

fn source_name_of(path: &Path) -> String {
    path.display().to_string()
}

/// Read collar records from any CSV source.
pub fn read_collars<R: Read>(
    reader: R,
    columns: &ColumnConfig,
    source_name: &str,
) -> Result<Vec<CollarRecord>> {
    let mut reader = csv_reader(reader);
    let col_map = header_map(reader.headers()?);

    let idx = require_columns(
        &col_map,
        &[
            columns.hole_id.as_str(),
            columns.eastings.as_str(),
            columns.northings.as_str(),
            columns.rl.as_str(),
        ],
        source_name,
    )?;

    let mut collars = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);
        let Some(hole_id) = hole_id_of(&record, idx[0]) else {
            continue;
        };

        collars.push(CollarRecord {
            hole_id,
            eastings: parse_number(&record, idx[1], &columns.eastings, line),
            northings: parse_number(&record, idx[2], &columns.northings, line),
            rl: parse_number(&record, idx[3], &columns.rl, line),
        });
    }

    debug!("{}: {} collar records", source_name, collars.len());
    Ok(collars)
}

/// Load collar records from a CSV file.
///
/// # Arguments
///
/// * `path` - Path to the collar CSV
/// * `columns` - Column names for hole id, eastings, northings and RL
///
/// # Errors
///
/// Returns an error if the file cannot be read or lacks required columns.
pub fn load_collars_csv<P: AsRef<Path>>(path: P, columns: &ColumnConfig) -> Result<Vec<CollarRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_collars(BufReader::new(file), columns, &source_name_of(path))
}

/// Read survey stations from any CSV source.
pub fn read_surveys<R: Read>(
    reader: R,
    columns: &ColumnConfig,
    source_name: &str,
) -> Result<Vec<SurveyStation>> {
    let mut reader = csv_reader(reader);
    let col_map = header_map(reader.headers()?);

    let idx = require_columns(
        &col_map,
        &[
            columns.hole_id.as_str(),
            columns.survey_depth.as_str(),
            columns.azimuth.as_str(),
            columns.dip.as_str(),
        ],
        source_name,
    )?;

    let mut stations = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);
        let Some(hole_id) = hole_id_of(&record, idx[0]) else {
            continue;
        };

        stations.push(SurveyStation {
            hole_id,
            depth: parse_number(&record, idx[1], &columns.survey_depth, line),
            azimuth: parse_number(&record, idx[2], &columns.azimuth, line),
            dip: parse_number(&record, idx[3], &columns.dip, line),
        });
    }

    debug!("{}: {} survey stations", source_name, stations.len());
    Ok(stations)
}

/// Load survey stations from a CSV file.
pub fn load_surveys_csv<P: AsRef<Path>>(path: P, columns: &ColumnConfig) -> Result<Vec<SurveyStation>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_surveys(BufReader::new(file), columns, &source_name_of(path))
}

/// A parsed interval-table row before value columns are typed.
struct RawRow {
    hole_id: String,
    start: f64,
    end: f64,
    cells: Vec<String>,
}

/// Decide the aggregation kind of a value column.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>, force_categorical: bool) -> ValueKind {
    if force_categorical {
        return ValueKind::Categorical;
    }

    let numeric = cells
        .filter(|c| !c.is_empty())
        .all(|c| c.parse::<f64>().map_or(false, |v| v.is_finite()));

    if numeric {
        ValueKind::Numeric
    } else {
        ValueKind::Categorical
    }
}

/// Parsed interval rows with the extent of each usable row.
struct IntervalRows {
    value_names: Vec<String>,
    rows: Vec<RawRow>,
    /// `(row index, start, end)` per record
    spans: Vec<(usize, f64, f64)>,
}

fn read_interval_rows<R: Read>(
    reader: R,
    columns: &ColumnConfig,
    with_values: bool,
    source_name: &str,
) -> Result<IntervalRows> {
    let mut reader = csv_reader(reader);
    let headers = reader.headers()?.clone();
    let col_map = header_map(&headers);

    let hole_idx = require_columns(&col_map, &[columns.hole_id.as_str()], source_name)?[0];

    let from_idx = col_map.get(&columns.from.to_lowercase()).copied();
    let to_idx = col_map.get(&columns.to.to_lowercase()).copied();
    let depth_idx = col_map.get(&columns.depth.to_lowercase()).copied();

    let bounds = match (from_idx, to_idx, depth_idx) {
        (Some(f), Some(t), _) => (f, Some(t)),
        (_, _, Some(d)) => (d, None),
        _ => {
            return Err(LoaderError::MissingColumns {
                source_name: source_name.to_string(),
                columns: format!("{}/{} or {}", columns.from, columns.to, columns.depth),
            })
        }
    };

    let value_names: Vec<String> = if !with_values {
        Vec::new()
    } else if columns.values.is_empty() {
        let reserved = [Some(hole_idx), Some(bounds.0), bounds.1];
        headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !reserved.contains(&Some(*i)))
            .map(|(_, name)| name.trim().to_string())
            .collect()
    } else {
        columns.values.clone()
    };
    let value_refs: Vec<&str> = value_names.iter().map(String::as_str).collect();
    let value_idx = require_columns(&col_map, &value_refs, source_name)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);
        let Some(hole_id) = hole_id_of(&record, hole_idx) else {
            continue;
        };

        let start = parse_number(&record, bounds.0, &headers[bounds.0], line);
        let end = match bounds.1 {
            Some(t) => parse_number(&record, t, &headers[t], line),
            None => f64::NAN,
        };
        let cells = value_idx
            .iter()
            .map(|&i| record.get(i).unwrap_or("").to_string())
            .collect();

        rows.push(RawRow {
            hole_id,
            start,
            end,
            cells,
        });
    }

    // Point samples: derive each row's extent from the next depth in its hole
    let spans: Vec<(usize, f64, f64)> = if bounds.1.is_some() {
        rows.iter()
            .enumerate()
            .map(|(i, row)| (i, row.start, row.end))
            .collect()
    } else {
        let depths: Vec<(&str, f64)> = rows.iter().map(|r| (r.hole_id.as_str(), r.start)).collect();
        let spans = point_depths_to_intervals(&depths);
        let dropped = rows.len() - spans.len();
        if dropped > 0 {
            warn!(
                "{}: {} trailing point sample(s) without extent dropped",
                source_name, dropped
            );
        }
        spans
    };

    Ok(IntervalRows {
        value_names,
        rows,
        spans,
    })
}

/// Read interval data from any CSV source, one [`SourceTable`] per value column.
///
/// When both the `from` and `to` columns exist they delimit each record.
/// Otherwise the `depth` column is used and consecutive depths within a hole
/// are taken as contiguous; the last point of each hole has no extent and is
/// dropped.
///
/// # Arguments
///
/// * `reader` - CSV source
/// * `columns` - Column names; an empty `values` list selects every
///   non-depth, non-id column
/// * `categorical` - Value columns forced to categorical aggregation
/// * `source_name` - Label used in log messages and errors
pub fn read_intervals<R: Read>(
    reader: R,
    columns: &ColumnConfig,
    categorical: &[String],
    source_name: &str,
) -> Result<Vec<SourceTable>> {
    let IntervalRows {
        value_names,
        rows,
        spans,
    } = read_interval_rows(reader, columns, true, source_name)?;

    let tables = value_names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let force = categorical.iter().any(|c| c.eq_ignore_ascii_case(name));
            let kind = infer_kind(rows.iter().map(|r| r.cells[col].as_str()), force);

            let records = spans
                .iter()
                .map(|&(row_idx, start, end)| {
                    let row = &rows[row_idx];
                    let cell = row.cells[col].as_str();
                    let value = if cell.is_empty() {
                        None
                    } else {
                        Some(match kind {
                            ValueKind::Numeric => SampleValue::Numeric(cell.parse().unwrap_or(f64::NAN)),
                            ValueKind::Categorical => SampleValue::Categorical(cell.to_string()),
                        })
                    };

                    SourceInterval {
                        hole_id: row.hole_id.clone(),
                        depth_start: start,
                        depth_end: end,
                        value,
                    }
                })
                .collect();

            debug!("{}: field '{}' loaded as {:?}", source_name, name, kind);
            SourceTable::new(name.clone(), kind, records)
        })
        .collect();

    Ok(tables)
}

/// Load interval data from a CSV file, one [`SourceTable`] per value column.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has neither from/to nor a
/// depth column, or lacks a requested value column.
pub fn load_intervals_csv<P: AsRef<Path>>(
    path: P,
    columns: &ColumnConfig,
    categorical: &[String],
) -> Result<Vec<SourceTable>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_intervals(BufReader::new(file), columns, categorical, &source_name_of(path))
}

/// Read only the depth extents of an interval table, ignoring value columns.
///
/// Records carry no value; they are used to derive composite boundaries
/// from an existing interval table.
pub fn read_interval_extents<R: Read>(
    reader: R,
    columns: &ColumnConfig,
    source_name: &str,
) -> Result<Vec<SourceInterval>> {
    let IntervalRows { rows, spans, .. } = read_interval_rows(reader, columns, false, source_name)?;

    Ok(spans
        .into_iter()
        .map(|(row_idx, start, end)| SourceInterval {
            hole_id: rows[row_idx].hole_id.clone(),
            depth_start: start,
            depth_end: end,
            value: None,
        })
        .collect())
}

/// Load the depth extents of an interval table from a CSV file.
pub fn load_interval_extents_csv<P: AsRef<Path>>(
    path: P,
    columns: &ColumnConfig,
) -> Result<Vec<SourceInterval>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_interval_extents(BufReader::new(file), columns, &source_name_of(path))
}
