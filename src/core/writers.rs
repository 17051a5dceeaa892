//! CSV writers for pipeline outputs.
//!
//! This module provides functions for writing:
//! - Desurveyed sample tables (one 3D position per depth)
//! - Composite tables (one value column per source field)
//! - Per-hole batch reports
//!
//! Numeric output uses a fixed number of decimal places so repeated runs
//! produce byte-identical files.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::{CompositeRow, DesurveyedSample, SampleValue};
use crate::processors::batch::{HoleReport, HoleStatus};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// A composite row does not have one value per field.
    #[error("composite row for hole '{hole_id}' has {values} values, expected {fields}")]
    FieldMismatch {
        hole_id: String,
        values: usize,
        fields: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// A CSV writer that tags every error with the output path.
struct TableWriter {
    inner: csv::Writer<BufWriter<File>>,
    path: String,
}

impl TableWriter {
    fn create(path: &Path) -> Result<Self> {
        ensure_parent_dirs(path)?;

        let file = File::create(path).map_err(|e| WriteError::CreateFile {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            inner: csv::Writer::from_writer(BufWriter::new(file)),
            path: path.display().to_string(),
        })
    }

    fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.inner.write_record(row).map_err(|e| WriteError::CsvError {
            path: self.path.clone(),
            source: e,
        })
    }

    fn finish(mut self) -> Result<()> {
        self.inner.flush().map_err(|e| WriteError::WriteFile {
            path: self.path,
            source: e,
        })
    }
}

#[inline]
fn fixed(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// Format a composite value; empty composites become an empty cell.
fn format_value(value: Option<&SampleValue>, precision: usize) -> String {
    match value {
        Some(SampleValue::Numeric(v)) => fixed(*v, precision),
        Some(SampleValue::Categorical(code)) => code.clone(),
        None => String::new(),
    }
}

/// Write desurveyed samples to CSV.
///
/// Columns: `Hole ID, Depth, Eastings, Northings, RL`.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `samples` - Desurveyed samples in output order
/// * `precision` - Decimal places for numeric columns
pub fn write_desurvey_csv(path: &Path, samples: &[DesurveyedSample], precision: usize) -> Result<()> {
    let mut writer = TableWriter::create(path)?;

    writer.write_row(["Hole ID", "Depth", "Eastings", "Northings", "RL"])?;

    for s in samples {
        writer.write_row([
            s.hole_id.clone(),
            fixed(s.depth, precision),
            fixed(s.eastings, precision),
            fixed(s.northings, precision),
            fixed(s.rl, precision),
        ])?;
    }

    writer.finish()
}

/// Write composite rows to CSV.
///
/// Columns: `Hole ID, Composite Depth Start, Composite Depth End` followed by
/// `Composite <field>` for every field. Numeric values use `precision`
/// decimal places, categorical values are written as-is and empty
/// composites are written as empty cells.
///
/// # Errors
///
/// Returns `FieldMismatch` if a row does not carry one value per field, or
/// an I/O error if the file cannot be written.
pub fn write_composite_csv(
    path: &Path,
    fields: &[String],
    rows: &[CompositeRow],
    precision: usize,
) -> Result<()> {
    if let Some(bad) = rows.iter().find(|r| r.values.len() != fields.len()) {
        return Err(WriteError::FieldMismatch {
            hole_id: bad.hole_id.clone(),
            values: bad.values.len(),
            fields: fields.len(),
        });
    }

    let mut writer = TableWriter::create(path)?;

    let mut header = vec![
        "Hole ID".to_string(),
        "Composite Depth Start".to_string(),
        "Composite Depth End".to_string(),
    ];
    header.extend(fields.iter().map(|f| format!("Composite {}", f)));
    writer.write_row(&header)?;

    let mut record = Vec::with_capacity(header.len());
    for row in rows {
        record.clear();
        record.push(row.hole_id.clone());
        record.push(fixed(row.interval_start, precision));
        record.push(fixed(row.interval_end, precision));
        record.extend(row.values.iter().map(|v| format_value(v.value.as_ref(), precision)));
        writer.write_row(&record)?;
    }

    writer.finish()
}

/// Write the per-hole report of a batch run.
///
/// Columns: `Hole ID, Status, Rows, Detail`, with status `ok`, `no_data` or
/// `failed` and the failure reason as detail.
pub fn write_hole_report_csv(path: &Path, holes: &[HoleReport]) -> Result<()> {
    let mut writer = TableWriter::create(path)?;

    writer.write_row(["Hole ID", "Status", "Rows", "Detail"])?;

    for hole in holes {
        let (status, rows, detail) = match &hole.status {
            HoleStatus::Processed { rows } => ("ok", *rows, String::new()),
            HoleStatus::NoData => ("no_data", 0, String::new()),
            HoleStatus::Failed(e) => ("failed", 0, e.to_string()),
        };
        writer.write_row([
            hole.hole_id.clone(),
            status.to_string(),
            rows.to_string(),
            detail,
        ])?;
    }

    writer.finish()
}
