//! Target interval generation for compositing.

use std::collections::HashMap;

use crate::config::IntervalSpec;
use crate::core::loaders::SourceInterval;

use super::error::{ProcessingError, Result};

/// Bins shorter than this at the end of a range are not emitted.
const SLIVER: f64 = 1e-9;

/// Upper bound on the number of uniform bins or resampling depths per hole.
pub const MAX_INTERVALS_PER_HOLE: usize = 1_000_000;

/// How a single hole's depth range is partitioned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartitionMode<'a> {
    /// Contiguous bins of a fixed length starting at the range minimum
    Uniform(f64),
    /// Caller-supplied boundaries, used as-is
    Boundaries(&'a [f64]),
}

/// Check a uniform bin length.
pub fn validate_length(length: f64) -> Result<()> {
    if !length.is_finite() || length <= 0.0 {
        return Err(ProcessingError::InvalidInterval(format!(
            "interval length must be positive, got {}",
            length
        )));
    }
    Ok(())
}

/// Check a boundary list: at least two finite, strictly increasing points.
pub fn validate_boundaries(boundaries: &[f64]) -> Result<()> {
    if boundaries.len() < 2 {
        return Err(ProcessingError::InvalidInterval(format!(
            "boundary list needs at least 2 points, got {}",
            boundaries.len()
        )));
    }
    if let Some(bad) = boundaries.iter().find(|b| !b.is_finite()) {
        return Err(ProcessingError::InvalidInterval(format!(
            "non-finite boundary {}",
            bad
        )));
    }
    if let Some(pair) = boundaries.windows(2).find(|w| w[1] <= w[0]) {
        return Err(ProcessingError::InvalidInterval(format!(
            "boundaries not strictly increasing: {} then {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Reject a uniform length that would split `span` into more than
/// [`MAX_INTERVALS_PER_HOLE`] pieces.
pub fn check_interval_count(span: f64, length: f64) -> Result<()> {
    let count = (span / length).ceil();
    if count > MAX_INTERVALS_PER_HOLE as f64 {
        return Err(ProcessingError::InvalidInterval(format!(
            "length {} over {} m gives {} intervals, limit is {}",
            length, span, count, MAX_INTERVALS_PER_HOLE
        )));
    }
    Ok(())
}

/// Validate every part of an interval spec up front.
///
/// Any failure here is a caller error and aborts the whole run.
pub fn validate_spec(spec: &IntervalSpec) -> Result<()> {
    match spec {
        IntervalSpec::Uniform { length } => validate_length(*length),
        IntervalSpec::Boundaries(list) => validate_boundaries(list),
        IntervalSpec::HoleBoundaries(map) => {
            for (hole, list) in map {
                validate_boundaries(list).map_err(|e| match e {
                    ProcessingError::InvalidInterval(msg) => {
                        ProcessingError::InvalidInterval(format!("hole '{}': {}", hole, msg))
                    }
                    other => other,
                })?;
            }
            Ok(())
        }
    }
}

/// Contiguous bins of `length` over `[min, max]`, the last one clipped to `max`.
fn uniform_intervals(min: f64, max: f64, length: f64) -> Vec<(f64, f64)> {
    let mut intervals = Vec::new();
    let mut i = 0usize;

    loop {
        // Computed from the origin each time so errors do not accumulate
        let start = min + i as f64 * length;
        if start >= max - SLIVER {
            break;
        }

        let mut end = (min + (i + 1) as f64 * length).min(max);
        if max - end <= SLIVER {
            end = max;
        }

        // Far from the origin consecutive starts can round to the same value
        if end > start {
            intervals.push((start, end));
        }
        i += 1;
    }

    intervals
}

/// Partition a hole's depth range into target intervals.
///
/// # Arguments
///
/// * `depth_range` - `(min, max)` depth of the hole's data; ignored for
///   `Boundaries`
/// * `mode` - Uniform bin length or explicit boundaries
///
/// # Returns
///
/// Ordered, contiguous `(start, end)` pairs with `end > start`. An empty
/// range yields no intervals in uniform mode.
///
/// # Errors
///
/// `InvalidInterval` for a non-positive length, a non-finite range, more
/// than [`MAX_INTERVALS_PER_HOLE`] uniform bins or an invalid boundary list.
///
/// # Example
///
/// ```
/// use drillhole_pipeline::processors::partition::{partition, PartitionMode};
///
/// let bins = partition((0.0, 5.0), PartitionMode::Uniform(2.0)).unwrap();
/// assert_eq!(bins, vec![(0.0, 2.0), (2.0, 4.0), (4.0, 5.0)]);
/// ```
pub fn partition(depth_range: (f64, f64), mode: PartitionMode<'_>) -> Result<Vec<(f64, f64)>> {
    match mode {
        PartitionMode::Uniform(length) => {
            validate_length(length)?;
            let (min, max) = depth_range;
            if !min.is_finite() || !max.is_finite() {
                return Err(ProcessingError::InvalidInterval(format!(
                    "non-finite depth range [{}, {}]",
                    min, max
                )));
            }
            if max <= min {
                return Ok(Vec::new());
            }
            check_interval_count(max - min, length)?;
            Ok(uniform_intervals(min, max, length))
        }
        PartitionMode::Boundaries(boundaries) => {
            validate_boundaries(boundaries)?;
            Ok(boundaries.windows(2).map(|w| (w[0], w[1])).collect())
        }
    }
}

/// Derive per-hole boundary lists from an existing interval table.
///
/// Every finite start and end depth of a hole becomes a boundary; the lists
/// are sorted and de-duplicated. Holes with fewer than two distinct depths
/// are left out.
pub fn boundaries_from_intervals<'a, I>(records: I) -> HashMap<String, Vec<f64>>
where
    I: IntoIterator<Item = &'a SourceInterval>,
{
    let mut map: HashMap<String, Vec<f64>> = HashMap::new();

    for record in records {
        let entry = map.entry(record.hole_id.clone()).or_default();
        entry.extend(
            [record.depth_start, record.depth_end]
                .into_iter()
                .filter(|d| d.is_finite()),
        );
    }

    for list in map.values_mut() {
        list.sort_by(f64::total_cmp);
        list.dedup();
    }
    map.retain(|_, list| list.len() >= 2);

    map
}
