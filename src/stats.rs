//! Distance statistics over point sequences
//!
//! All statistics here are computed over the Euclidean distances between
//! consecutive points of a trace, which is what the outlier filter reasons
//! about: a spurious detection shows up as an abnormally long jump.

use crate::types::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Read-only snapshot of consecutive-point distance statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceStatistics {
    /// Number of points in the trace (not the number of distances)
    pub point_count: usize,
    pub mean_distance: f64,
    pub median_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Population standard deviation of the distances
    pub std_dev_distance: f64,
}

/// Computes distance statistics for a point sequence
pub struct PointDistanceStats;

impl PointDistanceStats {
    /// Compute statistics for a trace.
    ///
    /// Fewer than two points yield all-zero statistics with the point count set.
    pub fn compute(points: &[Point]) -> DistanceStatistics {
        let distances = consecutive_distances(points);
        if distances.is_empty() {
            return DistanceStatistics {
                point_count: points.len(),
                ..Default::default()
            };
        }

        let count = distances.len() as f64;
        let mean = distances.iter().sum::<f64>() / count;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / count;
        let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
        let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        DistanceStatistics {
            point_count: points.len(),
            mean_distance: mean,
            median_distance: median(&distances),
            min_distance: min,
            max_distance: max,
            std_dev_distance: variance.sqrt(),
        }
    }
}

/// Distances between each point and its predecessor; `d[i]` belongs to point `i + 1`
pub fn consecutive_distances(points: &[Point]) -> Vec<f64> {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).collect()
}

/// Sort a copy of the values in ascending order
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Median of the values; the mean of the two middle values for even counts
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Linear-interpolated percentile of already sorted values.
///
/// Rank is `p/100 · (n-1)`; a fractional rank interpolates between the
/// values at its floor and ceiling.
pub fn percentile(sorted: &[f64], percentile: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let rank = (percentile / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }

    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// Median absolute deviation around a given median
pub fn median_absolute_deviation(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: i32, step: i32) -> Vec<Point> {
        (0..count).map(|i| Point::new(i * step, 0)).collect()
    }

    #[test]
    fn test_uniform_spacing_statistics() {
        let stats = PointDistanceStats::compute(&line(5, 10));

        assert_eq!(stats.point_count, 5);
        assert!((stats.mean_distance - 10.0).abs() < 0.1);
        assert!((stats.median_distance - 10.0).abs() < 0.1);
        assert!(stats.std_dev_distance.abs() < 1e-9);
        assert_eq!(stats.min_distance, 10.0);
        assert_eq!(stats.max_distance, 10.0);
    }

    #[test]
    fn test_single_point_statistics() {
        let stats = PointDistanceStats::compute(&[Point::new(4, 4)]);
        assert_eq!(stats.point_count, 1);
        assert_eq!(stats.mean_distance, 0.0);

        let empty = PointDistanceStats::compute(&[]);
        assert_eq!(empty.point_count, 0);
    }

    #[test]
    fn test_mixed_spacing_statistics() {
        // Distances 3-4-5 triangle steps: 5, 10
        let points = vec![Point::new(0, 0), Point::new(3, 4), Point::new(9, 12)];
        let stats = PointDistanceStats::compute(&points);

        assert!((stats.mean_distance - 7.5).abs() < 1e-9);
        assert!((stats.median_distance - 7.5).abs() < 1e-9);
        assert!((stats.std_dev_distance - 2.5).abs() < 1e-9);
        assert_eq!(stats.max_distance, 10.0);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [10.0, 20.0, 30.0, 40.0];
        // rank = 0.25 * 3 = 0.75
        assert!((percentile(&values, 25.0) - 17.5).abs() < 1e-9);
        // rank = 0.75 * 3 = 2.25
        assert!((percentile(&values, 75.0) - 32.5).abs() < 1e-9);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert_eq!(percentile(&[7.0], 25.0), 7.0);
    }

    #[test]
    fn test_mad() {
        let values = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        let center = median(&values);
        assert_eq!(center, 2.0);
        // deviations 1,1,0,0,2,4,7 -> median 1
        assert_eq!(median_absolute_deviation(&values, center), 1.0);
    }
}
