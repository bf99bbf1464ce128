//! Vision primitives
//!
//! The classifier and the session consume contour geometry through the
//! [`VisionPrimitives`] trait so that a different backend (an image library
//! binding, a GPU path) can be swapped in. [`PlanarGeometry`] is the pure-Rust
//! default: Ramer-Douglas-Peucker simplification, shoelace area, arc length,
//! monotone-chain convex hull and inclusive pixel bounding boxes.

use crate::error::TrackError;
use crate::mask::BinaryMask;
use crate::types::Point;

/// Geometry operations the pipeline delegates to a vision backend.
///
/// Every operation may fail; the session treats a failure as a failed
/// classification for that cycle only.
pub trait VisionPrimitives {
    /// Simplify a closed contour to a polygon with the given tolerance (pixels)
    fn simplify_to_polygon(&self, contour: &[Point], epsilon: f64) -> Result<Vec<Point>, TrackError>;

    /// Enclosed area of a closed contour
    fn contour_area(&self, points: &[Point]) -> Result<f64, TrackError>;

    /// Length of the polyline, including the closing edge when `closed`
    fn arc_length(&self, points: &[Point], closed: bool) -> Result<f64, TrackError>;

    /// Convex hull vertices
    fn convex_hull(&self, points: &[Point]) -> Result<Vec<Point>, TrackError>;

    /// Inclusive pixel extent `(width, height)` of the points
    fn bounding_box(&self, points: &[Point]) -> Result<(u32, u32), TrackError>;

    /// Outer boundary of the largest region of the mask
    fn extract_largest_contour(&self, mask: &BinaryMask) -> Result<Option<Vec<Point>>, TrackError>;

    /// Contour of a trace drawn as a stroke `stroke_width` pixels wide
    fn trace_contour(&self, trace: &[Point], stroke_width: u32) -> Result<Option<Vec<Point>>, TrackError> {
        match BinaryMask::from_trace(trace, stroke_width)? {
            Some(mask) => self.extract_largest_contour(&mask),
            None => Ok(None),
        }
    }
}

/// Pure-Rust implementation of [`VisionPrimitives`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometry;

impl VisionPrimitives for PlanarGeometry {
    fn simplify_to_polygon(&self, contour: &[Point], epsilon: f64) -> Result<Vec<Point>, TrackError> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(TrackError::GeometryError(format!(
                "invalid simplification epsilon {}",
                epsilon
            )));
        }
        Ok(simplify_closed(contour, epsilon))
    }

    fn contour_area(&self, points: &[Point]) -> Result<f64, TrackError> {
        Ok(polygon_area(points))
    }

    fn arc_length(&self, points: &[Point], closed: bool) -> Result<f64, TrackError> {
        let open: f64 = points.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        let closing = match (closed, points.first(), points.last()) {
            (true, Some(first), Some(last)) if points.len() > 1 => last.distance_to(first),
            _ => 0.0,
        };
        Ok(open + closing)
    }

    fn convex_hull(&self, points: &[Point]) -> Result<Vec<Point>, TrackError> {
        Ok(monotone_chain_hull(points))
    }

    fn bounding_box(&self, points: &[Point]) -> Result<(u32, u32), TrackError> {
        let first = points
            .first()
            .ok_or_else(|| TrackError::GeometryError("bounding box of empty point set".to_string()))?;

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let extent = |min: i32, max: i32| {
            u32::try_from(i64::from(max) - i64::from(min) + 1).unwrap_or(u32::MAX)
        };
        Ok((extent(min_x, max_x), extent(min_y, max_y)))
    }

    fn extract_largest_contour(&self, mask: &BinaryMask) -> Result<Option<Vec<Point>>, TrackError> {
        Ok(mask.largest_region_boundary())
    }
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice: i128 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i128::from(a.x) * i128::from(b.y) - i128::from(b.x) * i128::from(a.y))
        .sum();
    (twice as f64).abs() / 2.0
}

fn cross(o: Point, a: Point, b: Point) -> i128 {
    (i128::from(a.x) - i128::from(o.x)) * (i128::from(b.y) - i128::from(o.y))
        - (i128::from(a.y) - i128::from(o.y)) * (i128::from(b.x) - i128::from(o.x))
}

/// Andrew's monotone chain; collinear points are dropped
fn monotone_chain_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| (p.x, p.y));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Perpendicular distance from `p` to the line through `start` and `end`
fn perpendicular_distance(p: Point, start: Point, end: Point) -> f64 {
    let dx = f64::from(end.x) - f64::from(start.x);
    let dy = f64::from(end.y) - f64::from(start.y);
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-10 {
        return p.distance_to(&start);
    }

    let numerator =
        ((f64::from(p.x) - f64::from(start.x)) * dy - (f64::from(p.y) - f64::from(start.y)) * dx).abs();
    numerator / length_sq.sqrt()
}

/// Open-polyline Ramer-Douglas-Peucker; endpoints are always kept
fn simplify_open(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let start = points[0];
    let end = points[points.len() - 1];
    let (max_index, max_dist) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &p)| (i + 1, perpendicular_distance(p, start, end)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max_dist > epsilon {
        let mut left = simplify_open(&points[..=max_index], epsilon);
        let right = simplify_open(&points[max_index..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![start, end]
    }
}

fn farthest_from(points: &[Point], origin: Point) -> usize {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, origin.distance_to(p)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Inclusive cyclic run of points from index `from` to index `to`
fn cyclic_run(points: &[Point], from: usize, to: usize) -> Vec<Point> {
    let len = points.len();
    let count = (to + len - from) % len + 1;
    (0..count).map(|k| points[(from + k) % len]).collect()
}

/// Closed-contour simplification.
///
/// The contour is split at two mutually distant points, each half is
/// simplified as an open chain, and the halves are joined back together.
fn simplify_closed(contour: &[Point], epsilon: f64) -> Vec<Point> {
    if contour.len() <= 3 {
        return contour.to_vec();
    }

    let a = farthest_from(contour, contour[0]);
    let b = farthest_from(contour, contour[a]);
    if a == b || contour[a] == contour[b] {
        return vec![contour[a]];
    }

    let mut polygon = simplify_open(&cyclic_run(contour, a, b), epsilon);
    let back = simplify_open(&cyclic_run(contour, b, a), epsilon);
    polygon.pop();
    polygon.extend_from_slice(&back[..back.len() - 1]);
    polygon.dedup();
    polygon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_outline(size: i32, step: i32) -> Vec<Point> {
        let mut points = Vec::new();
        for x in (0..size).step_by(step as usize) {
            points.push(Point::new(x, 0));
        }
        for y in (0..size).step_by(step as usize) {
            points.push(Point::new(size, y));
        }
        for x in (1..=size).rev().step_by(step as usize) {
            points.push(Point::new(x, size));
        }
        for y in (1..=size).rev().step_by(step as usize) {
            points.push(Point::new(0, y));
        }
        points
    }

    fn corners(size: i32) -> Vec<Point> {
        vec![
            Point::new(0, 0),
            Point::new(size, 0),
            Point::new(size, size),
            Point::new(0, size),
        ]
    }

    #[test]
    fn test_area_and_arc_length() {
        let geometry = PlanarGeometry;
        let square = corners(100);

        assert_eq!(geometry.contour_area(&square).unwrap(), 10_000.0);
        assert_eq!(geometry.arc_length(&square, true).unwrap(), 400.0);
        assert_eq!(geometry.arc_length(&square, false).unwrap(), 300.0);
        assert_eq!(geometry.contour_area(&square[..2]).unwrap(), 0.0);
    }

    #[test]
    fn test_area_ignores_orientation() {
        let mut square = corners(10);
        square.reverse();
        assert_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn test_hull_drops_interior_points() {
        let mut points = corners(50);
        points.push(Point::new(25, 25));
        points.push(Point::new(10, 40));
        points.push(Point::new(25, 0));

        let hull = PlanarGeometry.convex_hull(&points).unwrap();
        assert_eq!(hull.len(), 4);
        assert_eq!(polygon_area(&hull), 2500.0);
    }

    #[test]
    fn test_bounding_box_is_inclusive() {
        let geometry = PlanarGeometry;
        assert_eq!(geometry.bounding_box(&corners(100)).unwrap(), (101, 101));

        let flat = vec![Point::new(0, 5), Point::new(40, 5)];
        assert_eq!(geometry.bounding_box(&flat).unwrap(), (41, 1));
        assert!(geometry.bounding_box(&[]).is_err());

        let extreme = vec![Point::new(i32::MIN, 0), Point::new(i32::MAX, 0)];
        assert_eq!(geometry.bounding_box(&extreme).unwrap(), (u32::MAX, 1));
    }

    #[test]
    fn test_simplify_dense_square_to_four_corners() {
        let outline = square_outline(100, 5);
        let perimeter = PlanarGeometry.arc_length(&outline, true).unwrap();
        let polygon = PlanarGeometry
            .simplify_to_polygon(&outline, 0.04 * perimeter)
            .unwrap();

        assert_eq!(polygon.len(), 4);
        for corner in corners(100) {
            assert!(polygon.contains(&corner), "missing corner {:?}", corner);
        }
    }

    #[test]
    fn test_simplify_keeps_tiny_contours() {
        let triangle = vec![Point::new(0, 0), Point::new(10, 0), Point::new(5, 8)];
        assert_eq!(PlanarGeometry.simplify_to_polygon(&triangle, 3.0).unwrap(), triangle);
        assert!(PlanarGeometry.simplify_to_polygon(&triangle, f64::NAN).is_err());
    }

    #[test]
    fn test_trace_contour_of_closed_loop() {
        let loop_trace = {
            let mut trace = square_outline(80, 10);
            trace.push(Point::new(0, 0));
            trace
        };
        let contour = PlanarGeometry.trace_contour(&loop_trace, 5).unwrap().unwrap();
        let area = PlanarGeometry.contour_area(&contour).unwrap();

        // Outer edge of a 5px stroke around an 80px square
        assert!(area > 80.0 * 80.0);
        assert!(area < 86.0 * 86.0);
        assert!(PlanarGeometry.trace_contour(&[], 5).unwrap().is_none());
    }
}
