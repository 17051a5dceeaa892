//! Overlap-weighted aggregation of source intervals onto target intervals.
//!
//! Every source record contributes to a target interval in proportion to the
//! length they overlap. Numeric fields take the length-weighted mean over the
//! covered length; categorical fields take the category with the greatest
//! covered length. Targets with no coverage get no value.

use crate::core::loaders::{CompositeValue, SampleValue, SourceInterval, ValueKind};

use super::error::{ProcessingError, Result};

/// Length shared by the half-open intervals `[a0, a1)` and `[b0, b1)`.
///
/// Touching intervals share nothing.
#[inline]
pub fn overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.1.min(b.1) - a.0.max(b.0)).max(0.0)
}

fn invalid(record: &SourceInterval, reason: impl Into<String>) -> ProcessingError {
    ProcessingError::InvalidSample {
        start: record.depth_start,
        end: record.depth_end,
        reason: reason.into(),
    }
}

/// Check a source record for use with a field of the given kind.
pub fn validate_record(record: &SourceInterval, kind: ValueKind) -> Result<()> {
    if !record.depth_start.is_finite() || !record.depth_end.is_finite() {
        return Err(invalid(record, "non-finite depth"));
    }
    if record.depth_end <= record.depth_start {
        return Err(invalid(record, "end depth not greater than start depth"));
    }

    match (&record.value, kind) {
        (Some(SampleValue::Numeric(v)), ValueKind::Numeric) if !v.is_finite() => {
            Err(invalid(record, format!("non-finite value {}", v)))
        }
        (Some(SampleValue::Categorical(code)), ValueKind::Numeric) => {
            Err(invalid(record, format!("non-numeric value '{}' in numeric field", code)))
        }
        _ => Ok(()),
    }
}

/// Running totals for one target interval.
enum Accumulator {
    Numeric { weighted_sum: f64 },
    /// Per-category covered length, in first-seen order
    Categorical { lengths: Vec<(String, f64)> },
}

impl Accumulator {
    fn new(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Numeric => Accumulator::Numeric { weighted_sum: 0.0 },
            ValueKind::Categorical => Accumulator::Categorical { lengths: Vec::new() },
        }
    }

    fn add(&mut self, value: &SampleValue, length: f64) {
        match self {
            Accumulator::Numeric { weighted_sum } => {
                if let SampleValue::Numeric(v) = value {
                    *weighted_sum += v * length;
                }
            }
            Accumulator::Categorical { lengths } => {
                let key = match value {
                    SampleValue::Categorical(code) => code.clone(),
                    SampleValue::Numeric(v) => v.to_string(),
                };
                match lengths.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, total)) => *total += length,
                    None => lengths.push((key, length)),
                }
            }
        }
    }

    fn finish(self, coverage: f64) -> SampleValue {
        match self {
            Accumulator::Numeric { weighted_sum } => SampleValue::Numeric(weighted_sum / coverage),
            Accumulator::Categorical { lengths } => {
                let mut best: Option<(String, f64)> = None;
                for (key, total) in lengths {
                    // Strict comparison keeps the first category on ties
                    if best.as_ref().map_or(true, |(_, b)| total > *b) {
                        best = Some((key, total));
                    }
                }
                SampleValue::Categorical(best.map(|(k, _)| k).unwrap_or_default())
            }
        }
    }
}

/// Aggregate one field of source intervals onto target intervals.
///
/// # Arguments
///
/// * `records` - Source intervals of a single hole, in any order
/// * `targets` - Ordered target `(start, end)` intervals
/// * `kind` - Mean for numeric fields, mode for categorical fields
/// * `min_coverage` - Minimum covered fraction of a target for it to get a value
///
/// # Returns
///
/// One [`CompositeValue`] per target. Records without a value add no
/// coverage; a target with zero coverage has `value: None`.
///
/// # Errors
///
/// `InvalidSample` if any record is malformed (see [`validate_record`]).
///
/// # Example
///
/// ```
/// use drillhole_pipeline::core::loaders::{SampleValue, SourceInterval, ValueKind};
/// use drillhole_pipeline::processors::aggregate::aggregate;
///
/// let records = vec![SourceInterval {
///     hole_id: "DH1".into(),
///     depth_start: 1.0,
///     depth_end: 3.0,
///     value: Some(SampleValue::Numeric(10.0)),
/// }];
/// let out = aggregate(&records, &[(2.0, 4.0)], ValueKind::Numeric, 0.0).unwrap();
/// assert_eq!(out[0].coverage, 1.0);
/// assert_eq!(out[0].value, Some(SampleValue::Numeric(10.0)));
/// ```
pub fn aggregate<'a, I>(
    records: I,
    targets: &[(f64, f64)],
    kind: ValueKind,
    min_coverage: f64,
) -> Result<Vec<CompositeValue>>
where
    I: IntoIterator<Item = &'a SourceInterval>,
{
    let mut sorted: Vec<&SourceInterval> = records.into_iter().collect();
    for record in &sorted {
        validate_record(record, kind)?;
    }
    sorted.sort_by(|a, b| a.depth_start.total_cmp(&b.depth_start));

    let composites = targets
        .iter()
        .map(|&(t_start, t_end)| {
            let mut acc = Accumulator::new(kind);
            let mut coverage = 0.0;

            for record in &sorted {
                if record.depth_start >= t_end {
                    break;
                }
                let Some(value) = &record.value else {
                    continue;
                };
                let length = overlap((record.depth_start, record.depth_end), (t_start, t_end));
                if length > 0.0 {
                    acc.add(value, length);
                    coverage += length;
                }
            }

            let span = t_end - t_start;
            let value = if coverage > 0.0 && coverage / span >= min_coverage {
                Some(acc.finish(coverage))
            } else {
                None
            };

            CompositeValue { value, coverage }
        })
        .collect();

    Ok(composites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn numeric(start: f64, end: f64, v: f64) -> SourceInterval {
        SourceInterval {
            hole_id: "DH1".to_string(),
            depth_start: start,
            depth_end: end,
            value: Some(SampleValue::Numeric(v)),
        }
    }

    fn code(start: f64, end: f64, c: &str) -> SourceInterval {
        SourceInterval {
            hole_id: "DH1".to_string(),
            depth_start: start,
            depth_end: end,
            value: Some(SampleValue::Categorical(c.to_string())),
        }
    }

    fn as_number(value: &CompositeValue) -> f64 {
        match value.value {
            Some(SampleValue::Numeric(v)) => v,
            ref other => panic!("expected numeric value, got {:?}", other),
        }
    }

    #[test]
    fn test_overlap() {
        assert_eq!(overlap((1.0, 3.0), (2.0, 4.0)), 1.0);
        assert_eq!(overlap((0.0, 2.0), (2.0, 4.0)), 0.0);
        assert_eq!(overlap((0.0, 1.0), (2.0, 4.0)), 0.0);
        assert_eq!(overlap((0.0, 10.0), (2.0, 4.0)), 2.0);
    }

    #[test]
    fn test_partial_overlap_weighted_mean() {
        let records = vec![numeric(1.0, 3.0, 10.0), numeric(3.0, 4.0, 20.0)];
        let out = aggregate(&records, &[(2.0, 4.0)], ValueKind::Numeric, 0.0).unwrap();

        assert_eq!(out[0].coverage, 2.0);
        assert_abs_diff_eq!(as_number(&out[0]), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unequal_weights() {
        // 0.5 m of 1.0 and 1.5 m of 3.0 over a 2 m composite
        let records = vec![numeric(0.0, 0.5, 1.0), numeric(0.5, 5.0, 3.0)];
        let out = aggregate(&records, &[(0.0, 2.0)], ValueKind::Numeric, 0.0).unwrap();

        assert_abs_diff_eq!(as_number(&out[0]), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_uncovered_target_is_none() {
        let records = vec![numeric(0.0, 1.0, 5.0)];
        let out = aggregate(&records, &[(0.0, 1.0), (1.0, 2.0), (5.0, 6.0)], ValueKind::Numeric, 0.0).unwrap();

        assert_eq!(out.len(), 3);
        assert!(out[0].value.is_some());
        assert_eq!(out[1], CompositeValue { value: None, coverage: 0.0 });
        assert_eq!(out[2].value, None);
    }

    #[test]
    fn test_null_values_add_no_coverage() {
        let mut empty = numeric(0.0, 1.0, 0.0);
        empty.value = None;
        let records = vec![empty, numeric(1.0, 2.0, 8.0)];

        let out = aggregate(&records, &[(0.0, 2.0)], ValueKind::Numeric, 0.0).unwrap();
        assert_eq!(out[0].coverage, 1.0);
        assert_eq!(as_number(&out[0]), 8.0);
    }

    #[test]
    fn test_min_coverage() {
        let records = vec![numeric(0.0, 0.5, 4.0)];
        let out = aggregate(&records, &[(0.0, 2.0)], ValueKind::Numeric, 0.5).unwrap();

        assert_eq!(out[0].value, None);
        assert_eq!(out[0].coverage, 0.5);

        let out = aggregate(&records, &[(0.0, 1.0)], ValueKind::Numeric, 0.5).unwrap();
        assert_eq!(as_number(&out[0]), 4.0);
    }

    #[test]
    fn test_unsorted_records() {
        let records = vec![numeric(2.0, 4.0, 6.0), numeric(0.0, 2.0, 2.0)];
        let out = aggregate(&records, &[(0.0, 2.0), (2.0, 4.0), (1.0, 3.0)], ValueKind::Numeric, 0.0).unwrap();

        assert_eq!(as_number(&out[0]), 2.0);
        assert_eq!(as_number(&out[1]), 6.0);
        assert_abs_diff_eq!(as_number(&out[2]), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_categorical_length_weighted_mode() {
        let records = vec![code(0.0, 0.8, "BAS"), code(0.8, 2.0, "GRN"), code(2.0, 2.5, "BAS")];
        let out = aggregate(&records, &[(0.0, 2.5)], ValueKind::Categorical, 0.0).unwrap();

        // BAS covers 1.3 m, GRN 1.2 m
        assert_eq!(out[0].value, Some(SampleValue::Categorical("BAS".to_string())));
        assert_abs_diff_eq!(out[0].coverage, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_categorical_tie_keeps_shallowest() {
        let records = vec![code(1.0, 2.0, "SED"), code(0.0, 1.0, "VOL")];
        let out = aggregate(&records, &[(0.0, 2.0)], ValueKind::Categorical, 0.0).unwrap();

        assert_eq!(out[0].value, Some(SampleValue::Categorical("VOL".to_string())));
    }

    #[test]
    fn test_invalid_records_rejected() {
        let reversed = numeric(3.0, 1.0, 1.0);
        assert!(matches!(
            aggregate(&[reversed], &[(0.0, 4.0)], ValueKind::Numeric, 0.0),
            Err(ProcessingError::InvalidSample { .. })
        ));

        let nan_depth = numeric(f64::NAN, 1.0, 1.0);
        assert!(aggregate(&[nan_depth], &[(0.0, 4.0)], ValueKind::Numeric, 0.0).is_err());

        let text = code(0.0, 1.0, "BAS");
        assert!(aggregate(&[text], &[(0.0, 4.0)], ValueKind::Numeric, 0.0).is_err());

        let nan_value = numeric(0.0, 1.0, f64::NAN);
        assert!(aggregate(&[nan_value], &[(0.0, 4.0)], ValueKind::Numeric, 0.0).is_err());
    }

    #[test]
    fn test_no_targets() {
        let records = vec![numeric(0.0, 1.0, 1.0)];
        let out = aggregate(&records, &[], ValueKind::Numeric, 0.0).unwrap();
        assert!(out.is_empty());
    }
}
