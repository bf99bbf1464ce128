//! Core types for the Lumen Trace pipeline
//!
//! This module defines the values that flow between the stages of the
//! pipeline: tracked points and traces, shape labels, classification results,
//! contour features and finalized traces ready for export.

use crate::stats::DistanceStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Integer pixel coordinate of a tracked point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Ordered sequence of points making up one continuous gesture.
///
/// A trace only grows by appending; points are never reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointTrace(Vec<Point>);

impl PointTrace {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, point: Point) {
        self.0.push(point);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Drop every point, keeping the allocation
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Move the points out, leaving an empty trace behind
    pub fn take(&mut self) -> PointTrace {
        PointTrace(std::mem::take(&mut self.0))
    }
}

impl From<Vec<Point>> for PointTrace {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for PointTrace {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Tracking mode supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Points form a drawn shape that gets classified
    #[default]
    Drawing,
    /// Points only move a cursor; positions are exported without classification
    Cursor,
}

impl TrackingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMode::Drawing => "drawing",
            TrackingMode::Cursor => "cursor",
        }
    }
}

/// Closed vocabulary of shape labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeLabel {
    Circle,
    Oval,
    Star,
    Cross,
    Triangle,
    Square,
    Diamond,
    Rectangle,
    Pentagon,
    Hexagon,
    Heptagon,
    Octagon,
    /// Generic many-sided polygon (more than ten vertices)
    Polygon,
    /// Polygon with an explicit vertex count, rendered as `polygon_N`
    PolygonN(usize),
    TooSmall,
    Empty,
    Unknown,
    Error,
}

impl ShapeLabel {
    /// True for labels that describe a recognised shape rather than a failure
    pub fn is_shape(&self) -> bool {
        !matches!(
            self,
            ShapeLabel::TooSmall | ShapeLabel::Empty | ShapeLabel::Unknown | ShapeLabel::Error
        )
    }
}

impl fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeLabel::Circle => "circle",
            ShapeLabel::Oval => "oval",
            ShapeLabel::Star => "star",
            ShapeLabel::Cross => "cross",
            ShapeLabel::Triangle => "triangle",
            ShapeLabel::Square => "square",
            ShapeLabel::Diamond => "diamond",
            ShapeLabel::Rectangle => "rectangle",
            ShapeLabel::Pentagon => "pentagon",
            ShapeLabel::Hexagon => "hexagon",
            ShapeLabel::Heptagon => "heptagon",
            ShapeLabel::Octagon => "octagon",
            ShapeLabel::Polygon => "polygon",
            ShapeLabel::PolygonN(n) => return write!(f, "polygon_{}", n),
            ShapeLabel::TooSmall => "too_small",
            ShapeLabel::Empty => "empty",
            ShapeLabel::Unknown => "unknown",
            ShapeLabel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for ShapeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = match s {
            "circle" => ShapeLabel::Circle,
            "oval" => ShapeLabel::Oval,
            "star" => ShapeLabel::Star,
            "cross" => ShapeLabel::Cross,
            "triangle" => ShapeLabel::Triangle,
            "square" => ShapeLabel::Square,
            "diamond" => ShapeLabel::Diamond,
            "rectangle" => ShapeLabel::Rectangle,
            "pentagon" => ShapeLabel::Pentagon,
            "hexagon" => ShapeLabel::Hexagon,
            "heptagon" => ShapeLabel::Heptagon,
            "octagon" => ShapeLabel::Octagon,
            "polygon" => ShapeLabel::Polygon,
            "too_small" => ShapeLabel::TooSmall,
            "empty" => ShapeLabel::Empty,
            "unknown" => ShapeLabel::Unknown,
            "error" => ShapeLabel::Error,
            other => {
                let count = other
                    .strip_prefix("polygon_")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| format!("unknown shape label '{}'", other))?;
                ShapeLabel::PolygonN(count)
            }
        };
        Ok(label)
    }
}

impl Serialize for ShapeLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShapeLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Shape label with a confidence score in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: ShapeLabel,
    pub confidence: f64,
}

impl ClassificationResult {
    /// Build a result, clamping confidence into [0, 1].
    ///
    /// The `error` label always carries zero confidence.
    pub fn new(label: ShapeLabel, confidence: f64) -> Self {
        let confidence = match label {
            ShapeLabel::Error => 0.0,
            _ if confidence.is_nan() => 0.0,
            _ => confidence.clamp(0.0, 1.0),
        };
        Self { label, confidence }
    }

    pub fn error() -> Self {
        Self::new(ShapeLabel::Error, 0.0)
    }

    pub fn empty() -> Self {
        Self::new(ShapeLabel::Empty, 0.0)
    }

    pub fn unknown() -> Self {
        Self::new(ShapeLabel::Unknown, 0.0)
    }

    /// True when the confidence reaches the given acceptance threshold
    pub fn meets(&self, threshold: f64) -> bool {
        self.label.is_shape() && self.confidence >= threshold
    }
}

/// Geometric features of a contour used by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContourFeatures {
    /// Vertex count of the simplified polygon
    pub vertices: usize,
    /// 4π·area/perimeter², 1.0 for a perfect circle
    pub circularity: f64,
    /// Bounding-box width / height of the simplified polygon
    pub aspect_ratio: f64,
    /// Area / convex hull area, 1.0 when fully convex
    pub convexity: f64,
    /// Raw contour area (pixels²)
    pub area: f64,
    /// Raw contour perimeter (pixels)
    pub perimeter: f64,
}

/// What closed out a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalizeReason {
    /// No point was observed for the configured timeout
    Timeout,
    /// The caller switched tracking mode while points were held
    ModeSwitch {
        from: TrackingMode,
        to: TrackingMode,
    },
    /// The frame source ended with points still held
    EndOfStream,
}

/// A committed trace: filtered points plus optional classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedTrace {
    pub reason: FinalizeReason,
    /// Mode the points were gathered in
    pub mode: TrackingMode,
    /// Number of points before outlier filtering
    pub raw_point_count: usize,
    /// Points surviving the outlier filter, in capture order
    pub points: PointTrace,
    /// Distance statistics of the filtered points
    pub statistics: DistanceStatistics,
    /// Present only when the trace was classified
    pub classification: Option<ClassificationResult>,
    /// Classification reached the finalize confidence threshold
    pub accepted: bool,
    pub finished_at: DateTime<Utc>,
}

impl FinalizedTrace {
    /// Label of the accepted classification, if any
    pub fn accepted_label(&self) -> Option<ShapeLabel> {
        match (self.accepted, self.classification) {
            (true, Some(result)) => Some(result.label),
            _ => None,
        }
    }
}
