//! Geometric transformations along a drillhole.
//!
//! This module provides the straight-line (tangential) survey step that turns
//! a depth increment plus azimuth/dip into a 3D displacement, interpolation
//! along the resulting straight segments, and the conversion of point samples
//! into contiguous depth intervals.

use std::collections::HashMap;

use crate::config::DipConvention;
use crate::processors::error::{ProcessingError, Result};

/// A point in collar coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub eastings: f64,
    pub northings: f64,
    pub rl: f64,
}

impl Position {
    pub fn new(eastings: f64, northings: f64, rl: f64) -> Self {
        Self {
            eastings,
            northings,
            rl,
        }
    }

    /// Returns true if every coordinate is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.eastings.is_finite() && self.northings.is_finite() && self.rl.is_finite()
    }

    /// Point at fraction `t` of the way from `self` to `other`.
    #[inline]
    pub fn lerp(&self, other: &Position, t: f64) -> Position {
        Position {
            eastings: self.eastings + (other.eastings - self.eastings) * t,
            northings: self.northings + (other.northings - self.northings) * t,
            rl: self.rl + (other.rl - self.rl) * t,
        }
    }
}

/// Unit direction vector (east, north, up) of a hole heading.
///
/// # Arguments
///
/// * `azimuth_deg` - Bearing in degrees clockwise from north
/// * `dip_deg` - Inclination in degrees
/// * `convention` - Which dip sign points downward
pub fn direction_cosines(azimuth_deg: f64, dip_deg: f64, convention: DipConvention) -> [f64; 3] {
    let az = azimuth_deg.to_radians();
    let dp = dip_deg.to_radians();
    let (sin_az, cos_az) = az.sin_cos();
    let (sin_dp, cos_dp) = dp.sin_cos();

    let up = match convention {
        DipConvention::NegativeDown => sin_dp,
        DipConvention::PositiveDown => -sin_dp,
    };

    [sin_az * cos_dp, cos_az * cos_dp, up]
}

/// Advance a position along a straight segment.
///
/// The segment has length `delta_depth` and the heading given by
/// `azimuth_deg`/`dip_deg`:
///
/// ```text
/// e'  = e  + d * sin(az) * cos(dip)
/// n'  = n  + d * cos(az) * cos(dip)
/// rl' = rl + d * sin(dip)   (NegativeDown; PositiveDown subtracts)
/// ```
///
/// # Errors
///
/// `InvalidGeometry` if `delta_depth` is negative or any input is not finite.
///
/// # Example
///
/// ```
/// use drillhole_pipeline::config::DipConvention;
/// use drillhole_pipeline::core::transforms::{step, Position};
///
/// let collar = Position::new(0.0, 0.0, 100.0);
/// let next = step(&collar, 10.0, 0.0, -90.0, DipConvention::NegativeDown).unwrap();
/// assert!((next.rl - 90.0).abs() < 1e-9);
/// ```
pub fn step(
    prev: &Position,
    delta_depth: f64,
    azimuth_deg: f64,
    dip_deg: f64,
    convention: DipConvention,
) -> Result<Position> {
    if !prev.is_finite() {
        return Err(ProcessingError::InvalidGeometry(format!(
            "non-finite start position ({}, {}, {})",
            prev.eastings, prev.northings, prev.rl
        )));
    }
    if !delta_depth.is_finite() || !azimuth_deg.is_finite() || !dip_deg.is_finite() {
        return Err(ProcessingError::InvalidGeometry(format!(
            "non-finite survey input (delta {}, azimuth {}, dip {})",
            delta_depth, azimuth_deg, dip_deg
        )));
    }
    if delta_depth < 0.0 {
        return Err(ProcessingError::InvalidGeometry(format!(
            "negative depth increment {}",
            delta_depth
        )));
    }

    let [de, dn, du] = direction_cosines(azimuth_deg, dip_deg, convention);

    Ok(Position {
        eastings: prev.eastings + delta_depth * de,
        northings: prev.northings + delta_depth * dn,
        rl: prev.rl + delta_depth * du,
    })
}

/// Interpolate the position at `depth` on the straight segment
/// `(depth_a, a)` -> `(depth_b, b)`.
///
/// A zero-length segment returns `b`.
pub fn interpolate(depth_a: f64, a: &Position, depth_b: f64, b: &Position, depth: f64) -> Position {
    let span = depth_b - depth_a;
    if span <= 0.0 {
        return *b;
    }
    a.lerp(b, (depth - depth_a) / span)
}

/// Turn point samples into contiguous intervals.
///
/// Rows are grouped by hole id (first-seen order) and stably sorted by depth;
/// each row then spans up to the next depth of its hole. The deepest row of
/// each hole has no extent and is omitted.
///
/// # Arguments
///
/// * `depths` - `(hole_id, depth)` per source row
///
/// # Returns
///
/// `(row_index, start, end)` triples ordered by hole then depth
pub fn point_depths_to_intervals(depths: &[(&str, f64)]) -> Vec<(usize, f64, f64)> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();

    for (i, &(hole, _)) in depths.iter().enumerate() {
        groups
            .entry(hole)
            .or_insert_with(|| {
                order.push(hole);
                Vec::new()
            })
            .push(i);
    }

    let mut spans = Vec::with_capacity(depths.len());
    for hole in order {
        let mut rows = groups.remove(hole).unwrap_or_default();
        rows.sort_by(|&a, &b| depths[a].1.total_cmp(&depths[b].1));

        for pair in rows.windows(2) {
            spans.push((pair[0], depths[pair[0]].1, depths[pair[1]].1));
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ORIGIN: Position = Position {
        eastings: 1000.0,
        northings: 2000.0,
        rl: 300.0,
    };

    #[test]
    fn test_step_north_horizontal() {
        let p = step(&ORIGIN, 25.0, 0.0, 0.0, DipConvention::NegativeDown).unwrap();

        assert_eq!(p.eastings, 1000.0);
        assert_eq!(p.northings, 2025.0);
        assert_eq!(p.rl, 300.0);
    }

    #[test]
    fn test_step_vertical_down() {
        let p = step(&ORIGIN, 40.0, 123.0, -90.0, DipConvention::NegativeDown).unwrap();

        assert_abs_diff_eq!(p.eastings, 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.northings, 2000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.rl, 260.0, epsilon = 1e-9);
    }

    #[test]
    fn test_step_positive_down_convention() {
        let p = step(&ORIGIN, 40.0, 0.0, 90.0, DipConvention::PositiveDown).unwrap();
        assert_abs_diff_eq!(p.rl, 260.0, epsilon = 1e-9);

        let q = step(&ORIGIN, 40.0, 0.0, 90.0, DipConvention::NegativeDown).unwrap();
        assert_abs_diff_eq!(q.rl, 340.0, epsilon = 1e-9);
    }

    #[test]
    fn test_step_east_inclined() {
        // 60 degrees below horizontal towards east
        let p = step(&ORIGIN, 10.0, 90.0, -60.0, DipConvention::NegativeDown).unwrap();

        assert_abs_diff_eq!(p.eastings, 1005.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.northings, 2000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.rl, 300.0 - 10.0 * 3f64.sqrt() / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_step_zero_delta_is_identity() {
        let p = step(&ORIGIN, 0.0, 45.0, -30.0, DipConvention::NegativeDown).unwrap();
        assert_eq!(p, ORIGIN);
    }

    #[test]
    fn test_step_rejects_negative_delta() {
        let err = step(&ORIGIN, -1.0, 0.0, -90.0, DipConvention::NegativeDown).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidGeometry(_)));
    }

    #[test]
    fn test_step_rejects_non_finite() {
        let conv = DipConvention::NegativeDown;
        assert!(step(&ORIGIN, f64::NAN, 0.0, 0.0, conv).is_err());
        assert!(step(&ORIGIN, 1.0, f64::INFINITY, 0.0, conv).is_err());
        assert!(step(&ORIGIN, 1.0, 0.0, f64::NAN, conv).is_err());

        let bad = Position::new(f64::NAN, 0.0, 0.0);
        assert!(step(&bad, 1.0, 0.0, 0.0, conv).is_err());
    }

    #[test]
    fn test_step_is_continuous() {
        let conv = DipConvention::NegativeDown;
        let a = step(&ORIGIN, 50.0, 30.0, -45.0, conv).unwrap();
        let b = step(&ORIGIN, 50.0 + 1e-7, 30.0 + 1e-7, -45.0 - 1e-7, conv).unwrap();

        assert_abs_diff_eq!(a.eastings, b.eastings, epsilon = 1e-4);
        assert_abs_diff_eq!(a.northings, b.northings, epsilon = 1e-4);
        assert_abs_diff_eq!(a.rl, b.rl, epsilon = 1e-4);
    }

    #[test]
    fn test_direction_cosines_unit_length() {
        let [e, n, u] = direction_cosines(217.0, -63.0, DipConvention::NegativeDown);
        assert_abs_diff_eq!(e * e + n * n + u * u, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let b = Position::new(1010.0, 2020.0, 280.0);
        let mid = interpolate(10.0, &ORIGIN, 20.0, &b, 15.0);

        assert_abs_diff_eq!(mid.eastings, 1005.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mid.northings, 2010.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mid.rl, 290.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interpolate_zero_length_segment() {
        let b = Position::new(1.0, 2.0, 3.0);
        assert_eq!(interpolate(5.0, &ORIGIN, 5.0, &b, 5.0), b);
    }

    #[test]
    fn test_point_depths_to_intervals_sorts_per_hole() {
        let depths = vec![("A", 4.0), ("B", 0.0), ("A", 0.0), ("A", 2.0), ("B", 3.0)];
        let spans = point_depths_to_intervals(&depths);

        assert_eq!(spans, vec![(2, 0.0, 2.0), (3, 2.0, 4.0), (1, 0.0, 3.0)]);
    }

    #[test]
    fn test_point_depths_to_intervals_single_point() {
        let spans = point_depths_to_intervals(&[("A", 1.0)]);
        assert!(spans.is_empty());
    }
}
