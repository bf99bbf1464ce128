//! Outlier filtering for tracked traces
//!
//! Flicker, reflections and tracking jumps show up as abnormally long steps
//! between consecutive points. The filter looks at the distance from each
//! point to its predecessor and drops points whose step is out of bounds:
//! - IQR: quartile fences with a median-based cap
//! - Modified Z-score: median / MAD standardisation
//! - Hybrid: IQR followed by Modified Z-score, iterated until stable
//!
//! The first point is always kept, survivors keep their order, and the
//! output is never longer than the input.

use crate::stats::{consecutive_distances, median, median_absolute_deviation, percentile, sorted};
use crate::types::{Point, PointTrace};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default IQR fence multiplier
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// Default Modified Z-score threshold
pub const DEFAULT_Z_THRESHOLD: f64 = 3.5;

/// Default Hybrid iteration cap
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Minimum trace length for IQR and Hybrid filtering
pub const MIN_POINTS_IQR: usize = 4;

/// Minimum trace length for Modified Z-score filtering
pub const MIN_POINTS_Z_SCORE: usize = 3;

/// Consistency constant of the modified z-score
const MODIFIED_Z_SCALE: f64 = 0.6745;

/// Below this spread, distances are treated as uniform
const DEGENERATE_SPREAD: f64 = 0.01;

/// Outlier detection policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierPolicy {
    Iqr {
        multiplier: f64,
    },
    ModifiedZScore {
        threshold: f64,
    },
    Hybrid {
        iqr_multiplier: f64,
        z_threshold: f64,
        max_iterations: u32,
    },
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        OutlierPolicy::Hybrid {
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            z_threshold: DEFAULT_Z_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl OutlierPolicy {
    pub fn iqr() -> Self {
        OutlierPolicy::Iqr {
            multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }

    pub fn modified_z_score() -> Self {
        OutlierPolicy::ModifiedZScore {
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }

    /// Shortest trace the policy will touch; shorter traces pass through unchanged
    pub fn minimum_points(&self) -> usize {
        match self {
            OutlierPolicy::ModifiedZScore { .. } => MIN_POINTS_Z_SCORE,
            OutlierPolicy::Iqr { .. } | OutlierPolicy::Hybrid { .. } => MIN_POINTS_IQR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutlierPolicy::Iqr { .. } => "iqr",
            OutlierPolicy::ModifiedZScore { .. } => "modified_z_score",
            OutlierPolicy::Hybrid { .. } => "hybrid",
        }
    }
}

/// Result of a filter run with bookkeeping for logging and reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub points: Vec<Point>,
    /// Number of points dropped
    pub removed: usize,
    /// Passes that removed at least one point (Hybrid); 1 or 0 for single-pass policies
    pub iterations: u32,
}

/// Applies an [`OutlierPolicy`] to point sequences
pub struct OutlierFilter;

impl OutlierFilter {
    /// Filter a trace with the given policy
    pub fn filter(trace: &PointTrace, policy: OutlierPolicy) -> PointTrace {
        Self::filter_points(trace.points(), policy).into()
    }

    /// Filter a point slice with the given policy
    pub fn filter_points(points: &[Point], policy: OutlierPolicy) -> Vec<Point> {
        Self::filter_with_report(points, policy).points
    }

    /// Filter and report how many points were removed and in how many passes
    pub fn filter_with_report(points: &[Point], policy: OutlierPolicy) -> FilterOutcome {
        let (filtered, iterations) = match policy {
            OutlierPolicy::Iqr { multiplier } => {
                let filtered = remove_outliers_iqr(points, multiplier);
                let passes = u32::from(filtered.len() < points.len());
                (filtered, passes)
            }
            OutlierPolicy::ModifiedZScore { threshold } => {
                let filtered = remove_outliers_z_score(points, threshold);
                let passes = u32::from(filtered.len() < points.len());
                (filtered, passes)
            }
            OutlierPolicy::Hybrid {
                iqr_multiplier,
                z_threshold,
                max_iterations,
            } => hybrid_passes(points, iqr_multiplier, z_threshold, max_iterations),
        };

        let removed = points.len() - filtered.len();
        if removed > 0 {
            debug!(
                policy = policy.name(),
                before = points.len(),
                after = filtered.len(),
                iterations,
                "removed outlier points"
            );
        }

        FilterOutcome {
            points: filtered,
            removed,
            iterations,
        }
    }
}

/// Remove points whose step from their predecessor falls outside IQR fences.
///
/// The upper fence is capped at `median + max(4·median, 150)` so a single
/// extreme jump cannot inflate Q3 enough to admit a second one. When the
/// distances are essentially uniform the fence falls back to
/// `median + max(2·median, 50)`.
pub fn remove_outliers_iqr(points: &[Point], multiplier: f64) -> Vec<Point> {
    if points.len() < MIN_POINTS_IQR {
        return points.to_vec();
    }

    let distances = consecutive_distances(points);
    let ordered = sorted(&distances);

    let q1 = percentile(&ordered, 25.0);
    let q3 = percentile(&ordered, 75.0);
    let iqr = q3 - q1;
    let mid = median(&ordered);

    let upper_bound = if iqr < DEGENERATE_SPREAD {
        mid + (mid * 2.0).max(50.0)
    } else {
        let fence = q3 + multiplier * iqr;
        let cap = mid + (mid * 4.0).max(150.0);
        fence.min(cap)
    };
    let lower_bound = (q1 - multiplier * iqr).max(0.0);

    retain_by_distance(points, &distances, |d| d >= lower_bound && d <= upper_bound)
}

/// Remove points whose step has a modified z-score above the threshold.
///
/// A MAD below 0.01 is replaced with half the median distance.
/// Retains point `i` iff `|z| ≤ threshold`.
pub fn remove_outliers_z_score(points: &[Point], threshold: f64) -> Vec<Point> {
    if points.len() < MIN_POINTS_Z_SCORE {
        return points.to_vec();
    }

    let distances = consecutive_distances(points);
    let mid = median(&distances);
    let mut mad = median_absolute_deviation(&distances, mid);
    if mad < DEGENERATE_SPREAD {
        mad = mid * 0.5;
    }

    // A zero fallback (median step of zero) makes z NaN or infinite, and the
    // point is dropped
    retain_by_distance(points, &distances, |d| {
        let z = MODIFIED_Z_SCALE * (d - mid) / mad;
        z.abs() <= threshold
    })
}

/// IQR then Modified Z-score, repeated until a pass removes nothing
pub fn remove_outliers_hybrid(
    points: &[Point],
    iqr_multiplier: f64,
    z_threshold: f64,
    max_iterations: u32,
) -> Vec<Point> {
    hybrid_passes(points, iqr_multiplier, z_threshold, max_iterations).0
}

fn hybrid_passes(
    points: &[Point],
    iqr_multiplier: f64,
    z_threshold: f64,
    max_iterations: u32,
) -> (Vec<Point>, u32) {
    if points.len() < MIN_POINTS_IQR {
        return (points.to_vec(), 0);
    }

    let mut current = points.to_vec();
    let mut iterations = 0;

    while iterations < max_iterations {
        let before = current.len();
        current = remove_outliers_iqr(&current, iqr_multiplier);
        current = remove_outliers_z_score(&current, z_threshold);

        if current.len() == before {
            break;
        }
        iterations += 1;
    }

    (current, iterations)
}

/// Keep point 0 unconditionally and point `i` when `keep(d[i-1])` holds
fn retain_by_distance<F>(points: &[Point], distances: &[f64], keep: F) -> Vec<Point>
where
    F: Fn(f64) -> bool,
{
    let mut filtered = Vec::with_capacity(points.len());
    filtered.extend(points.first().copied());
    filtered.extend(
        points
            .iter()
            .skip(1)
            .zip(distances)
            .filter(|&(_, &d)| keep(d))
            .map(|(p, _)| *p),
    );
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump_trace() -> Vec<Point> {
        vec![
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(20, 20),
            Point::new(30, 30),
            Point::new(500, 500),
            Point::new(40, 40),
            Point::new(50, 50),
            Point::new(60, 60),
        ]
    }

    fn is_subsequence(sub: &[Point], full: &[Point]) -> bool {
        let mut it = full.iter();
        sub.iter().all(|p| it.any(|q| q == p))
    }

    #[test]
    fn test_iqr_removes_jump() {
        let points = jump_trace();
        let filtered = remove_outliers_iqr(&points, DEFAULT_IQR_MULTIPLIER);

        assert!(filtered.len() < points.len());
        assert!(!filtered.contains(&Point::new(500, 500)));
        assert_eq!(filtered[0], Point::new(0, 0));
        assert!(is_subsequence(&filtered, &points));
    }

    #[test]
    fn test_hybrid_removes_jump_and_converges() {
        let points = jump_trace();
        let outcome = OutlierFilter::filter_with_report(&points, OutlierPolicy::default());

        assert!(!outcome.points.contains(&Point::new(500, 500)));
        assert!(outcome.iterations <= 3);
        assert_eq!(outcome.removed, points.len() - outcome.points.len());
        assert!(is_subsequence(&outcome.points, &points));
    }

    #[test]
    fn test_hybrid_is_idempotent_once_converged() {
        let points = jump_trace();
        let once = OutlierFilter::filter_points(&points, OutlierPolicy::default());
        let twice = OutlierFilter::filter_with_report(&once, OutlierPolicy::default());

        assert_eq!(twice.removed, 0);
        assert_eq!(twice.points, once);
    }

    #[test]
    fn test_short_traces_pass_through() {
        let three = vec![Point::new(0, 0), Point::new(1000, 0), Point::new(0, 5)];
        assert_eq!(remove_outliers_iqr(&three, 1.5), three);
        assert_eq!(
            OutlierFilter::filter_points(&three, OutlierPolicy::default()),
            three
        );

        let two = vec![Point::new(0, 0), Point::new(1000, 1000)];
        assert_eq!(remove_outliers_z_score(&two, 3.5), two);
        assert!(remove_outliers_iqr(&[], 1.5).is_empty());
    }

    #[test]
    fn test_uniform_steps_are_kept() {
        let points: Vec<Point> = (0..10).map(|i| Point::new(i * 7, i * 3)).collect();
        for policy in [
            OutlierPolicy::iqr(),
            OutlierPolicy::modified_z_score(),
            OutlierPolicy::default(),
        ] {
            assert_eq!(OutlierFilter::filter_points(&points, policy), points);
        }
    }

    #[test]
    fn test_stationary_points_collapse_to_first() {
        // Every step is zero: median and MAD fallback are both zero
        let points = vec![Point::new(5, 5); 6];
        assert_eq!(remove_outliers_iqr(&points, 1.5), points);
        assert_eq!(remove_outliers_z_score(&points, 3.5), vec![Point::new(5, 5)]);

        let outcome = OutlierFilter::filter_with_report(&points, OutlierPolicy::default());
        assert_eq!(outcome.points, vec![Point::new(5, 5)]);
        assert_eq!(outcome.removed, 5);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_z_score_removes_spike() {
        let mut points: Vec<Point> = (0..8).map(|i| Point::new(i * 10, 0)).collect();
        points.insert(4, Point::new(35, 400));
        let filtered = remove_outliers_z_score(&points, DEFAULT_Z_THRESHOLD);

        assert!(!filtered.contains(&Point::new(35, 400)));
        assert_eq!(filtered[0], points[0]);
    }

    #[test]
    fn test_first_point_survives_even_when_far() {
        let mut points = vec![Point::new(900, 900)];
        points.extend((0..8).map(|i| Point::new(i * 5, 0)));

        let filtered = OutlierFilter::filter_points(&points, OutlierPolicy::default());
        assert_eq!(filtered[0], Point::new(900, 900));
        assert!(filtered.len() <= points.len());
    }

    #[test]
    fn test_policy_minimums() {
        assert_eq!(OutlierPolicy::iqr().minimum_points(), 4);
        assert_eq!(OutlierPolicy::default().minimum_points(), 4);
        assert_eq!(OutlierPolicy::modified_z_score().minimum_points(), 3);
    }

    #[test]
    fn test_policy_json_shape() {
        let json = serde_json::to_value(OutlierPolicy::default()).unwrap();
        assert_eq!(json["method"], "hybrid");
        assert_eq!(json["max_iterations"], 3);

        let parsed: OutlierPolicy =
            serde_json::from_str(r#"{"method":"iqr","multiplier":2.0}"#).unwrap();
        assert_eq!(parsed, OutlierPolicy::Iqr { multiplier: 2.0 });
    }

    #[test]
    fn test_trace_wrapper_matches_slice_filter() {
        let trace: PointTrace = jump_trace().into();
        let filtered = OutlierFilter::filter(&trace, OutlierPolicy::iqr());
        assert_eq!(
            filtered.points(),
            remove_outliers_iqr(trace.points(), 1.5).as_slice()
        );
    }
}
