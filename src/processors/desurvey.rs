//! Trajectory reconstruction from survey stations.
//!
//! Walks a hole's stations from the collar using the straight-line
//! (tangential) step: each station's azimuth/dip applies over the depth
//! interval since the previous station. Positions between stations are
//! recovered by linear interpolation along those straight segments.

use log::debug;

use crate::config::{DesurveyConfig, StationOrder};
use crate::core::loaders::{CollarRecord, DesurveyedSample, SurveyStation};
use crate::core::transforms::{interpolate, step, Position};

use super::error::{ProcessingError, Result};
use super::partition::check_interval_count;

/// Gaps shorter than this are not resampled separately.
const DEPTH_EPSILON: f64 = 1e-9;

/// Collar coordinates as a [`Position`].
#[inline]
pub fn collar_position(collar: &CollarRecord) -> Position {
    Position::new(collar.eastings, collar.northings, collar.rl)
}

/// Order stations by depth according to the configured policy.
fn ordered_stations<'a>(
    stations: Vec<&'a SurveyStation>,
    policy: StationOrder,
) -> Result<Vec<&'a SurveyStation>> {
    if let Some(bad) = stations.iter().find(|s| !s.depth.is_finite()) {
        return Err(ProcessingError::InvalidGeometry(format!(
            "non-finite station depth {}",
            bad.depth
        )));
    }

    match policy {
        StationOrder::Sort => {
            let mut sorted = stations;
            sorted.sort_by(|a, b| a.depth.total_cmp(&b.depth));
            Ok(sorted)
        }
        StationOrder::Reject => {
            if let Some(pair) = stations.windows(2).find(|w| w[1].depth < w[0].depth) {
                return Err(ProcessingError::UnorderedStations {
                    previous: pair[0].depth,
                    depth: pair[1].depth,
                });
            }
            Ok(stations)
        }
    }
}

/// Desurvey one hole at its survey stations.
///
/// Starts at the collar (depth 0) and emits one sample per station, in
/// ascending depth order. A hole without stations yields no samples.
///
/// # Arguments
///
/// * `collar` - Collar of the hole; its id labels the output
/// * `stations` - The hole's survey stations in any order
/// * `config` - Dip convention and station-order policy
///
/// # Errors
///
/// * `InvalidGeometry` for non-finite inputs or negative station depths
/// * `UnorderedStations` when the policy is `Reject` and depths decrease
pub fn integrate<'a, I>(
    collar: &CollarRecord,
    stations: I,
    config: &DesurveyConfig,
) -> Result<Vec<DesurveyedSample>>
where
    I: IntoIterator<Item = &'a SurveyStation>,
{
    let stations = ordered_stations(stations.into_iter().collect(), config.station_order)?;

    let mut position = collar_position(collar);
    let mut previous_depth = 0.0;
    let mut samples = Vec::with_capacity(stations.len());

    for station in stations {
        let delta = station.depth - previous_depth;
        position = step(
            &position,
            delta,
            station.azimuth,
            station.dip,
            config.dip_convention,
        )?;

        samples.push(DesurveyedSample {
            hole_id: collar.hole_id.clone(),
            depth: station.depth,
            eastings: position.eastings,
            northings: position.northings,
            rl: position.rl,
        });
        previous_depth = station.depth;
    }

    debug!("{}: {} stations desurveyed", collar.hole_id, samples.len());
    Ok(samples)
}

fn sample_position(sample: &DesurveyedSample) -> Position {
    Position::new(sample.eastings, sample.northings, sample.rl)
}

/// Position at an arbitrary depth along an integrated path.
///
/// Returns `None` outside `[0, last sample depth]` or for an empty path.
pub fn position_at(collar: &Position, samples: &[DesurveyedSample], depth: f64) -> Option<Position> {
    let last = samples.last()?;
    if !depth.is_finite() || depth < 0.0 || depth > last.depth {
        return None;
    }

    let mut prev_depth = 0.0;
    let mut prev_pos = *collar;
    for sample in samples {
        let pos = sample_position(sample);
        if depth <= sample.depth {
            return Some(interpolate(prev_depth, &prev_pos, sample.depth, &pos, depth));
        }
        prev_depth = sample.depth;
        prev_pos = pos;
    }

    None
}

/// Resample a path at the requested depths.
///
/// Depths are sorted and de-duplicated; depths outside the path are skipped.
pub fn resample_at(
    collar: &CollarRecord,
    samples: &[DesurveyedSample],
    depths: &[f64],
) -> Vec<DesurveyedSample> {
    let origin = collar_position(collar);

    let mut depths: Vec<f64> = depths.to_vec();
    depths.sort_by(f64::total_cmp);
    depths.dedup();

    depths
        .into_iter()
        .filter_map(|depth| match position_at(&origin, samples, depth) {
            Some(pos) => Some(DesurveyedSample {
                hole_id: collar.hole_id.clone(),
                depth,
                eastings: pos.eastings,
                northings: pos.northings,
                rl: pos.rl,
            }),
            None => {
                debug!("{}: depth {} outside surveyed path", collar.hole_id, depth);
                None
            }
        })
        .collect()
}

/// Resample a path every `interval` metres from the collar, always including
/// the final station depth.
///
/// # Errors
///
/// `InvalidInterval` if `interval` is not a positive finite number or would
/// produce more than [`super::partition::MAX_INTERVALS_PER_HOLE`] depths.
pub fn resample_uniform(
    collar: &CollarRecord,
    samples: &[DesurveyedSample],
    interval: f64,
) -> Result<Vec<DesurveyedSample>> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(ProcessingError::InvalidInterval(format!(
            "desurvey interval must be positive, got {}",
            interval
        )));
    }

    let Some(last) = samples.last() else {
        return Ok(Vec::new());
    };
    check_interval_count(last.depth, interval)?;

    let mut depths = Vec::new();
    let mut i = 0usize;
    loop {
        let depth = i as f64 * interval;
        if depth >= last.depth - DEPTH_EPSILON {
            break;
        }
        depths.push(depth);
        i += 1;
    }
    depths.push(last.depth);

    Ok(resample_at(collar, samples, &depths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DipConvention;
    use approx::assert_abs_diff_eq;

    fn collar() -> CollarRecord {
        CollarRecord {
            hole_id: "DH1".to_string(),
            eastings: 500.0,
            northings: 1000.0,
            rl: 200.0,
        }
    }

    fn station(depth: f64, azimuth: f64, dip: f64) -> SurveyStation {
        SurveyStation {
            hole_id: "DH1".to_string(),
            depth,
            azimuth,
            dip,
        }
    }

    #[test]
    fn test_single_horizontal_north_station() {
        let stations = vec![station(30.0, 0.0, 0.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].depth, 30.0);
        assert_eq!(samples[0].eastings, 500.0);
        assert_eq!(samples[0].northings, 1030.0);
        assert_eq!(samples[0].rl, 200.0);
    }

    #[test]
    fn test_vertical_hole_drops_rl_by_depth() {
        let stations = vec![station(0.0, 0.0, -90.0), station(50.0, 0.0, -90.0), station(120.0, 45.0, -90.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].rl, 200.0);
        assert_abs_diff_eq!(samples[1].rl, 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(samples[2].rl, 80.0, epsilon = 1e-9);
        for s in &samples {
            assert_abs_diff_eq!(s.eastings, 500.0, epsilon = 1e-9);
            assert_abs_diff_eq!(s.northings, 1000.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_uses_increment_not_cumulative_depth() {
        // Two horizontal north legs of 10 m each end 20 m north of the collar
        let stations = vec![station(10.0, 0.0, 0.0), station(20.0, 0.0, 0.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        assert_eq!(samples[1].northings, 1020.0);
    }

    #[test]
    fn test_current_station_heading_applies_to_preceding_leg() {
        let stations = vec![station(10.0, 0.0, 0.0), station(20.0, 90.0, 0.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        assert_abs_diff_eq!(samples[1].eastings, 510.0, epsilon = 1e-9);
        assert_abs_diff_eq!(samples[1].northings, 1010.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unordered_stations_sorted_by_default() {
        let stations = vec![station(20.0, 0.0, -90.0), station(10.0, 0.0, -90.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        assert_eq!(samples[0].depth, 10.0);
        assert_eq!(samples[1].depth, 20.0);
        assert_abs_diff_eq!(samples[1].rl, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unordered_stations_rejected() {
        let config = DesurveyConfig {
            station_order: StationOrder::Reject,
            ..DesurveyConfig::default()
        };
        let stations = vec![station(20.0, 0.0, -90.0), station(10.0, 0.0, -90.0)];
        let err = integrate(&collar(), &stations, &config).unwrap_err();

        assert_eq!(
            err,
            ProcessingError::UnorderedStations {
                previous: 20.0,
                depth: 10.0
            }
        );
    }

    #[test]
    fn test_negative_depth_is_invalid_geometry() {
        let stations = vec![station(-5.0, 0.0, -90.0)];
        let err = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidGeometry(_)));
    }

    #[test]
    fn test_nan_depth_is_invalid_geometry() {
        let stations = vec![station(f64::NAN, 0.0, -90.0), station(10.0, 0.0, -90.0)];
        let err = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidGeometry(_)));
    }

    #[test]
    fn test_positive_down_convention() {
        let config = DesurveyConfig {
            dip_convention: DipConvention::PositiveDown,
            ..DesurveyConfig::default()
        };
        let stations = vec![station(25.0, 0.0, 90.0)];
        let samples = integrate(&collar(), &stations, &config).unwrap();

        assert_abs_diff_eq!(samples[0].rl, 175.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_stations_no_samples() {
        let samples = integrate(&collar(), &Vec::<SurveyStation>::new(), &DesurveyConfig::default()).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_position_at_segment_midpoint() {
        let stations = vec![station(10.0, 0.0, 0.0), station(20.0, 90.0, 0.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();
        let origin = collar_position(&collar());

        let first = position_at(&origin, &samples, 5.0).unwrap();
        assert_abs_diff_eq!(first.northings, 1005.0, epsilon = 1e-9);

        let second = position_at(&origin, &samples, 15.0).unwrap();
        assert_abs_diff_eq!(second.eastings, 505.0, epsilon = 1e-9);
        assert_abs_diff_eq!(second.northings, 1010.0, epsilon = 1e-9);

        assert_eq!(position_at(&origin, &samples, 0.0), Some(origin));
        assert!(position_at(&origin, &samples, 20.5).is_none());
        assert!(position_at(&origin, &samples, -1.0).is_none());
    }

    #[test]
    fn test_resample_at_station_depths_reproduces_stations() {
        let stations = vec![station(12.0, 30.0, -60.0), station(40.0, 35.0, -58.0), station(75.0, 41.0, -55.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        let resampled = resample_at(&collar(), &samples, &[75.0, 12.0, 40.0]);

        assert_eq!(resampled.len(), 3);
        for (a, b) in resampled.iter().zip(samples.iter()) {
            assert_eq!(a.depth, b.depth);
            assert_abs_diff_eq!(a.eastings, b.eastings, epsilon = 1e-9);
            assert_abs_diff_eq!(a.northings, b.northings, epsilon = 1e-9);
            assert_abs_diff_eq!(a.rl, b.rl, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_resample_at_skips_out_of_range() {
        let stations = vec![station(10.0, 0.0, -90.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        let resampled = resample_at(&collar(), &samples, &[-2.0, 5.0, 15.0]);
        assert_eq!(resampled.len(), 1);
        assert_eq!(resampled[0].depth, 5.0);
        assert_abs_diff_eq!(resampled[0].rl, 195.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resample_uniform() {
        let stations = vec![station(10.0, 0.0, -90.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        let resampled = resample_uniform(&collar(), &samples, 4.0).unwrap();
        let depths: Vec<f64> = resampled.iter().map(|s| s.depth).collect();

        assert_eq!(depths, vec![0.0, 4.0, 8.0, 10.0]);
        assert_eq!(resampled[0].rl, 200.0);
        assert_abs_diff_eq!(resampled[2].rl, 192.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resample_uniform_rejects_too_many_depths() {
        let stations = vec![station(50.0, 0.0, -90.0)];
        let samples = integrate(&collar(), &stations, &DesurveyConfig::default()).unwrap();

        let err = resample_uniform(&collar(), &samples, 1e-9).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidInterval(_)));
    }

    #[test]
    fn test_resample_uniform_invalid_interval() {
        let err = resample_uniform(&collar(), &[], 0.0).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidInterval(_)));
    }
}
