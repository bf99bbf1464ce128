//! Binary masks
//!
//! A [`BinaryMask`] is a dense on/off grid anchored at an origin in pixel
//! space. Masks come from two places: a trace rasterised as a stroke, and a
//! frame thresholded with a color predicate. Both are then reduced to
//! connected regions, and the largest region to its outer boundary.

use crate::error::TrackError;
use crate::types::Point;
use std::collections::VecDeque;

/// Largest mask (in pixels) a trace may be rasterised into
pub const MAX_MASK_PIXELS: usize = 1 << 24;

/// Clockwise 8-neighbourhood starting east (y grows downwards)
const RING: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Index of west in [`RING`]
const WEST: usize = 4;

/// Pixel adjacency used when grouping set pixels into regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(&self) -> &'static [(i32, i32)] {
        const FOUR: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &RING,
        }
    }
}

/// Connected group of set pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Member pixels in mask-local coordinates, in discovery order
    pub pixels: Vec<(usize, usize)>,
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl Region {
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Integer centroid in mask-local coordinates
    pub fn centroid(&self) -> (usize, usize) {
        let count = self.pixels.len().max(1);
        let (sum_x, sum_y) = self
            .pixels
            .iter()
            .fold((0usize, 0usize), |(sx, sy), &(x, y)| (sx + x, sy + y));
        (sum_x / count, sum_y / count)
    }
}

/// Dense binary grid positioned at `origin` in pixel space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: usize,
    height: usize,
    origin: Point,
    data: Vec<bool>,
}

impl BinaryMask {
    /// Empty mask with its top-left corner at (0, 0)
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_origin(width, height, Point::new(0, 0))
    }

    pub fn with_origin(width: usize, height: usize, origin: Point) -> Self {
        Self {
            width,
            height,
            origin,
            data: vec![false; width * height],
        }
    }

    /// Rasterise a trace as a polyline stroke `stroke_width` pixels wide.
    ///
    /// The mask is sized to the trace's bounding box plus padding, so that
    /// boundary tracing never touches the mask edge. Returns `None` for an
    /// empty trace, and an error when the padded box would exceed
    /// [`MAX_MASK_PIXELS`] or leave the `i32` pixel space.
    pub fn from_trace(points: &[Point], stroke_width: u32) -> Result<Option<Self>, TrackError> {
        let Some(first) = points.first() else {
            return Ok(None);
        };
        let radius = i64::from(stroke_width / 2);
        let pad = radius + 2;

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let width = i64::from(max_x) - i64::from(min_x) + 1 + 2 * pad;
        let height = i64::from(max_y) - i64::from(min_y) + 1 + 2 * pad;
        let area = width.saturating_mul(height);
        if area > MAX_MASK_PIXELS as i64 {
            return Err(TrackError::GeometryError(format!(
                "trace extent {}x{} exceeds the {} pixel mask limit",
                width, height, MAX_MASK_PIXELS
            )));
        }

        let origin = match (
            i32::try_from(i64::from(min_x) - pad),
            i32::try_from(i64::from(min_y) - pad),
            i32::try_from(i64::from(max_x) + pad),
            i32::try_from(i64::from(max_y) + pad),
        ) {
            (Ok(x), Ok(y), Ok(_), Ok(_)) => Point::new(x, y),
            _ => {
                return Err(TrackError::GeometryError(
                    "trace too close to the edge of pixel space".to_string(),
                ))
            }
        };

        let radius = radius as i32;
        let mut mask = Self::with_origin(width as usize, height as usize, origin);
        if points.len() == 1 {
            mask.stamp_disk(*first, radius);
        }
        for segment in points.windows(2) {
            for p in line_pixels(segment[0], segment[1]) {
                mask.stamp_disk(p, radius);
            }
        }

        Ok(Some(mask))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Read a pixel in mask-local coordinates; out of range reads as unset
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    /// Set a pixel in mask-local coordinates; out of range writes are ignored
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        self.data[y as usize * self.width + x as usize] = value;
    }

    /// Set a pixel given in absolute pixel coordinates
    pub fn set_absolute(&mut self, point: Point) {
        self.set(point.x - self.origin.x, point.y - self.origin.y, true);
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Convert a mask-local coordinate to absolute pixel space
    pub fn to_absolute(&self, x: usize, y: usize) -> Point {
        Point::new(self.origin.x + x as i32, self.origin.y + y as i32)
    }

    fn stamp_disk(&mut self, center: Point, radius: i32) {
        let cx = center.x - self.origin.x;
        let cy = center.y - self.origin.y;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set(cx + dx, cy + dy, true);
                }
            }
        }
    }

    /// Group set pixels into connected regions, in raster order of first pixel
    pub fn regions(&self, connectivity: Connectivity) -> Vec<Region> {
        let mut visited = vec![false; self.data.len()];
        let mut regions = Vec::new();

        for y in 0..self.height {
            for x in 0..self.width {
                let index = y * self.width + x;
                if !self.data[index] || visited[index] {
                    continue;
                }
                visited[index] = true;
                regions.push(self.flood(x, y, connectivity, &mut visited));
            }
        }

        regions
    }

    fn flood(
        &self,
        start_x: usize,
        start_y: usize,
        connectivity: Connectivity,
        visited: &mut [bool],
    ) -> Region {
        let mut region = Region {
            pixels: Vec::new(),
            min_x: start_x,
            min_y: start_y,
            max_x: start_x,
            max_y: start_y,
        };
        let mut queue = VecDeque::from([(start_x, start_y)]);

        while let Some((x, y)) = queue.pop_front() {
            region.pixels.push((x, y));
            region.min_x = region.min_x.min(x);
            region.min_y = region.min_y.min(y);
            region.max_x = region.max_x.max(x);
            region.max_y = region.max_y.max(y);

            for &(dx, dy) in connectivity.offsets() {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if !self.get(nx, ny) {
                    continue;
                }
                let index = ny as usize * self.width + nx as usize;
                if !visited[index] {
                    visited[index] = true;
                    queue.push_back((nx as usize, ny as usize));
                }
            }
        }

        region
    }

    /// Outer boundary of the largest 8-connected region, in absolute coordinates
    pub fn largest_region_boundary(&self) -> Option<Vec<Point>> {
        let regions = self.regions(Connectivity::Eight);
        let largest = regions
            .iter()
            .reduce(|best, r| if r.pixel_count() > best.pixel_count() { r } else { best })?;

        let mut member = BinaryMask::new(self.width, self.height);
        for &(x, y) in &largest.pixels {
            member.set(x as i32, y as i32, true);
        }

        // Raster-first pixel: top-most row, left-most in that row
        let start = largest
            .pixels
            .iter()
            .min_by_key(|&&(x, y)| (y, x))
            .map(|&(x, y)| (x as i32, y as i32))?;

        let boundary = trace_boundary(&member, start, largest.pixel_count());
        Some(
            boundary
                .into_iter()
                .map(|(x, y)| self.to_absolute(x as usize, y as usize))
                .collect(),
        )
    }
}

/// Moore-neighbour boundary tracing, clockwise, stopping when the walk
/// re-enters the start pixel heading to the same successor
fn trace_boundary(member: &BinaryMask, start: (i32, i32), pixel_count: usize) -> Vec<(i32, i32)> {
    let mut boundary = vec![start];
    let mut current = start;
    let mut backtrack = WEST;
    let mut second: Option<(i32, i32)> = None;
    let max_steps = 4 * pixel_count + 16;

    for _ in 0..max_steps {
        let Some((next, next_backtrack)) = next_boundary_pixel(member, current, backtrack) else {
            // Isolated pixel
            break;
        };

        if current == start {
            match second {
                Some(s) if s == next => break,
                Some(_) => {}
                None => second = Some(next),
            }
        }

        boundary.push(next);
        current = next;
        backtrack = next_backtrack;
    }

    if boundary.len() > 1 && boundary.last() == Some(&start) {
        boundary.pop();
    }
    boundary
}

fn next_boundary_pixel(
    member: &BinaryMask,
    current: (i32, i32),
    backtrack: usize,
) -> Option<((i32, i32), usize)> {
    (1..=8).find_map(|k| {
        let dir = (backtrack + k) % 8;
        let candidate = (current.0 + RING[dir].0, current.1 + RING[dir].1);
        if !member.get(candidate.0, candidate.1) {
            return None;
        }
        let prev_dir = (dir + 7) % 8;
        let prev = (current.0 + RING[prev_dir].0, current.1 + RING[prev_dir].1);
        let offset = (prev.0 - candidate.0, prev.1 - candidate.1);
        let next_backtrack = RING.iter().position(|&d| d == offset).unwrap_or(WEST);
        Some((candidate, next_backtrack))
    })
}

/// Pixels on the segment from `a` to `b` (Bresenham), both ends included
pub fn line_pixels(a: Point, b: Point) -> Vec<Point> {
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (a.x, a.y);
    let mut pixels = Vec::with_capacity((dx - dy) as usize + 1);

    loop {
        pixels.push(Point::new(x, y));
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(width: usize, height: usize) -> BinaryMask {
        let mut mask = BinaryMask::new(width + 2, height + 2);
        for y in 1..=height {
            for x in 1..=width {
                mask.set(x as i32, y as i32, true);
            }
        }
        mask
    }

    #[test]
    fn test_line_pixels_include_endpoints() {
        let pixels = line_pixels(Point::new(0, 0), Point::new(5, 2));
        assert_eq!(pixels.first(), Some(&Point::new(0, 0)));
        assert_eq!(pixels.last(), Some(&Point::new(5, 2)));
        assert_eq!(pixels.len(), 6);

        let single = line_pixels(Point::new(3, 3), Point::new(3, 3));
        assert_eq!(single, vec![Point::new(3, 3)]);
    }

    #[test]
    fn test_regions_split_by_connectivity() {
        let mut mask = BinaryMask::new(4, 4);
        mask.set(0, 0, true);
        mask.set(1, 1, true);
        mask.set(3, 3, true);

        assert_eq!(mask.regions(Connectivity::Four).len(), 3);
        assert_eq!(mask.regions(Connectivity::Eight).len(), 2);
    }

    #[test]
    fn test_region_centroid_and_bounds() {
        let mask = block(3, 3);
        let regions = mask.regions(Connectivity::Four);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count(), 9);
        assert_eq!(regions[0].centroid(), (2, 2));
        assert_eq!((regions[0].min_x, regions[0].max_x), (1, 3));
    }

    #[test]
    fn test_boundary_of_solid_block() {
        let mask = block(5, 5);
        let boundary = mask.largest_region_boundary().unwrap();

        assert_eq!(boundary.len(), 16);
        assert_eq!(boundary[0], Point::new(1, 1));
        for p in &boundary {
            let on_edge = p.x == 1 || p.x == 5 || p.y == 1 || p.y == 5;
            assert!(on_edge, "{:?} is not on the block edge", p);
        }
    }

    #[test]
    fn test_boundary_of_single_pixel() {
        let mut mask = BinaryMask::new(3, 3);
        mask.set(1, 1, true);
        assert_eq!(mask.largest_region_boundary(), Some(vec![Point::new(1, 1)]));
    }

    #[test]
    fn test_boundary_picks_largest_region() {
        let mut mask = BinaryMask::new(20, 10);
        for y in 1..=4 {
            for x in 1..=4 {
                mask.set(x, y, true);
            }
        }
        mask.set(15, 5, true);

        let boundary = mask.largest_region_boundary().unwrap();
        assert!(boundary.iter().all(|p| p.x <= 4));
    }

    #[test]
    fn test_empty_mask_has_no_boundary() {
        assert!(BinaryMask::new(4, 4).largest_region_boundary().is_none());
        assert!(BinaryMask::new(4, 4).is_empty());
    }

    #[test]
    fn test_trace_stroke_is_offset_into_mask() {
        let trace = vec![Point::new(100, 100), Point::new(140, 100)];
        let mask = BinaryMask::from_trace(&trace, 5).unwrap().unwrap();

        // radius 2 + 2 padding
        assert_eq!(mask.origin(), Point::new(96, 96));
        assert!(mask.get(4, 4));
        assert!(mask.get(44, 4));
        assert!(!mask.get(0, 0));

        let boundary = mask.largest_region_boundary().unwrap();
        let min_x = boundary.iter().map(|p| p.x).min().unwrap();
        let max_x = boundary.iter().map(|p| p.x).max().unwrap();
        assert_eq!((min_x, max_x), (98, 142));
    }

    #[test]
    fn test_trace_empty_is_none() {
        assert!(BinaryMask::from_trace(&[], 5).unwrap().is_none());
    }

    #[test]
    fn test_oversized_trace_is_rejected() {
        // Span wider than i32 itself
        let huge = vec![Point::new(-2_000_000_000, 0), Point::new(2_000_000_000, 0)];
        assert!(matches!(
            BinaryMask::from_trace(&huge, 5),
            Err(TrackError::GeometryError(_))
        ));

        // Fits in i32 but not in the pixel budget
        let wide = vec![Point::new(0, 0), Point::new(60_000, 60_000)];
        assert!(BinaryMask::from_trace(&wide, 5).is_err());

        // Padding would leave pixel space
        let edge = vec![Point::new(i32::MAX, 0), Point::new(i32::MAX - 10, 0)];
        assert!(BinaryMask::from_trace(&edge, 5).is_err());
    }
}
