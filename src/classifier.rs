//! Geometric shape classification
//!
//! A contour is reduced to four features (vertex count of its simplified
//! polygon, circularity, aspect ratio and convexity) and run through an
//! ordered rule ladder. Rules overlap, so order is priority: the first rule
//! whose predicate holds decides the label.
//!
//! Simplification uses `epsilon = epsilon_factor · perimeter`, which keeps the
//! vertex count independent of the drawing's scale.

use crate::error::TrackError;
use crate::geometry::{PlanarGeometry, VisionPrimitives};
use crate::types::{ClassificationResult, ContourFeatures, Point, ShapeLabel};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Default simplification tolerance as a fraction of the perimeter
pub const DEFAULT_EPSILON_FACTOR: f64 = 0.04;

/// Contours enclosing less area than this are not classified
pub const MIN_CLASSIFIABLE_AREA: f64 = 100.0;

/// Epsilon factors used for multi-level approximation reports
pub const DEFAULT_APPROXIMATION_FACTORS: [f64; 7] = [0.005, 0.01, 0.02, 0.04, 0.06, 0.08, 0.10];

/// One step of the decision ladder
struct ShapeRule {
    applies: fn(&ContourFeatures) -> bool,
    outcome: fn(&ContourFeatures) -> ClassificationResult,
}

const RULES: [ShapeRule; 5] = [
    ShapeRule {
        applies: is_circle,
        outcome: circle,
    },
    ShapeRule {
        applies: is_oval,
        outcome: oval,
    },
    ShapeRule {
        applies: is_star,
        outcome: star,
    },
    ShapeRule {
        applies: is_cross,
        outcome: cross,
    },
    ShapeRule {
        applies: always,
        outcome: polygon_by_vertices,
    },
];

fn is_circle(f: &ContourFeatures) -> bool {
    f.circularity > 0.75
}

fn circle(f: &ContourFeatures) -> ClassificationResult {
    ClassificationResult::new(ShapeLabel::Circle, f.circularity.min(1.0) * 0.95)
}

/// Fairly round but clearly elongated
fn is_oval(f: &ContourFeatures) -> bool {
    f.circularity > 0.60 && (f.aspect_ratio < 0.75 || f.aspect_ratio > 1.33)
}

fn oval(f: &ContourFeatures) -> ClassificationResult {
    ClassificationResult::new(ShapeLabel::Oval, f.circularity * 0.85)
}

/// Many vertices and strongly concave
fn is_star(f: &ContourFeatures) -> bool {
    f.vertices >= 8 && f.convexity < 0.85
}

fn star(f: &ContourFeatures) -> ClassificationResult {
    ClassificationResult::new(ShapeLabel::Star, ((1.0 - f.convexity) * 1.2).min(0.95))
}

fn is_cross(f: &ContourFeatures) -> bool {
    f.vertices >= 12 && f.convexity < 0.90
}

fn cross(_: &ContourFeatures) -> ClassificationResult {
    ClassificationResult::new(ShapeLabel::Cross, 0.80)
}

fn always(_: &ContourFeatures) -> bool {
    true
}

fn polygon_by_vertices(f: &ContourFeatures) -> ClassificationResult {
    let (label, confidence) = match f.vertices {
        3 => (ShapeLabel::Triangle, 0.90),
        4 if (0.90..=1.10).contains(&f.aspect_ratio) => (ShapeLabel::Square, 0.92),
        4 if (0.85..=1.15).contains(&f.aspect_ratio) => (ShapeLabel::Diamond, 0.85),
        4 => (ShapeLabel::Rectangle, 0.88),
        5 => (ShapeLabel::Pentagon, 0.85),
        6 => (ShapeLabel::Hexagon, 0.85),
        7 => (ShapeLabel::Heptagon, 0.80),
        8 => (ShapeLabel::Octagon, 0.85),
        n if n > 10 && f.circularity > 0.50 => (ShapeLabel::Circle, f.circularity * 0.80),
        n if n > 10 => (ShapeLabel::Polygon, 0.70),
        n => (ShapeLabel::PolygonN(n), 0.65),
    };
    ClassificationResult::new(label, confidence)
}

/// Full classification report for one contour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAnalysis {
    pub result: ClassificationResult,
    /// Absent when the contour was too small to measure
    pub features: Option<ContourFeatures>,
    pub epsilon_factor: f64,
    /// Absolute simplification tolerance (pixels)
    pub epsilon: f64,
    /// Simplified polygon the vertex count comes from
    pub polygon: Vec<Point>,
    /// Inclusive bounding box of the polygon
    pub bounding_box: Option<(u32, u32)>,
}

impl fmt::Display for ShapeAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shape Analysis Details:")?;
        writeln!(f, "- Detected Shape: {}", self.result.label)?;
        writeln!(f, "- Confidence: {:.3}", self.result.confidence)?;
        writeln!(
            f,
            "- Epsilon Factor: {:.3} ({:.1}%)",
            self.epsilon_factor,
            self.epsilon_factor * 100.0
        )?;
        writeln!(f, "- Epsilon Value: {:.2}", self.epsilon)?;

        let Some(features) = &self.features else {
            return writeln!(f, "- Contour too small to measure");
        };
        writeln!(f, "- Vertices: {}", features.vertices)?;
        writeln!(f, "- Area: {:.1} pixels", features.area)?;
        writeln!(f, "- Perimeter: {:.1} pixels", features.perimeter)?;
        writeln!(f, "- Circularity: {:.3} (1.0 = perfect circle)", features.circularity)?;
        writeln!(f, "- Aspect Ratio: {:.3} (W/H)", features.aspect_ratio)?;
        writeln!(f, "- Convexity: {:.3} (1.0 = fully convex)", features.convexity)?;
        if let Some((w, h)) = self.bounding_box {
            writeln!(f, "- Bounding Box: {}x{}", w, h)?;
        }
        Ok(())
    }
}

/// Simplification result at one epsilon factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximationLevel {
    pub epsilon_factor: f64,
    pub epsilon: f64,
    pub original_points: usize,
    pub approximated_points: usize,
    /// approximated / original
    pub compression_ratio: f64,
    pub polygon: Vec<Point>,
}

/// Rule-based classifier over contour features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeClassifier {
    epsilon_factor: f64,
}

impl Default for ShapeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeClassifier {
    pub fn new() -> Self {
        Self {
            epsilon_factor: DEFAULT_EPSILON_FACTOR,
        }
    }

    pub fn with_epsilon_factor(epsilon_factor: f64) -> Self {
        Self { epsilon_factor }
    }

    pub fn epsilon_factor(&self) -> f64 {
        self.epsilon_factor
    }

    /// Classify an already simplified polygon given the raw contour's area
    /// and perimeter. Convexity is measured against the polygon's own hull.
    pub fn classify(&self, polygon: &[Point], area: f64, perimeter: f64) -> ClassificationResult {
        if area < MIN_CLASSIFIABLE_AREA {
            return ClassificationResult::new(ShapeLabel::TooSmall, 0.3);
        }

        match measure(&PlanarGeometry, polygon, polygon, area, perimeter) {
            Ok((features, _)) => Self::classify_features(&features),
            Err(_) => ClassificationResult::error(),
        }
    }

    /// Run the rule ladder over precomputed features
    pub fn classify_features(features: &ContourFeatures) -> ClassificationResult {
        if features.area < MIN_CLASSIFIABLE_AREA {
            return ClassificationResult::new(ShapeLabel::TooSmall, 0.3);
        }

        RULES
            .iter()
            .find(|rule| (rule.applies)(features))
            .map(|rule| (rule.outcome)(features))
            .unwrap_or_else(ClassificationResult::unknown)
    }

    /// Measure and classify a raw contour.
    ///
    /// The contour is simplified with `epsilon_factor · perimeter`; aspect
    /// ratio comes from the simplified polygon, convexity from the raw
    /// contour's hull.
    pub fn analyze_contour<P: VisionPrimitives>(
        &self,
        primitives: &P,
        contour: &[Point],
    ) -> Result<ShapeAnalysis, TrackError> {
        let area = primitives.contour_area(contour)?;
        let perimeter = primitives.arc_length(contour, true)?;
        let epsilon = self.epsilon_factor * perimeter;

        if area < MIN_CLASSIFIABLE_AREA {
            return Ok(ShapeAnalysis {
                result: ClassificationResult::new(ShapeLabel::TooSmall, 0.3),
                features: None,
                epsilon_factor: self.epsilon_factor,
                epsilon,
                polygon: Vec::new(),
                bounding_box: None,
            });
        }

        let polygon = primitives.simplify_to_polygon(contour, epsilon)?;
        let (features, bounding_box) = measure(primitives, &polygon, contour, area, perimeter)?;

        Ok(ShapeAnalysis {
            result: Self::classify_features(&features),
            features: Some(features),
            epsilon_factor: self.epsilon_factor,
            epsilon,
            polygon,
            bounding_box: Some(bounding_box),
        })
    }

    /// Simplify a contour at several epsilon factors
    pub fn approximation_levels<P: VisionPrimitives>(
        primitives: &P,
        contour: &[Point],
        factors: &[f64],
    ) -> Result<Vec<ApproximationLevel>, TrackError> {
        let perimeter = primitives.arc_length(contour, true)?;

        factors
            .iter()
            .map(|&factor| {
                let epsilon = factor * perimeter;
                let polygon = primitives.simplify_to_polygon(contour, epsilon)?;
                let compression_ratio = if contour.is_empty() {
                    1.0
                } else {
                    polygon.len() as f64 / contour.len() as f64
                };
                Ok(ApproximationLevel {
                    epsilon_factor: factor,
                    epsilon,
                    original_points: contour.len(),
                    approximated_points: polygon.len(),
                    compression_ratio,
                    polygon,
                })
            })
            .collect()
    }
}

/// Compute features of `polygon`, with convexity taken against the hull of `hull_source`
fn measure<P: VisionPrimitives>(
    primitives: &P,
    polygon: &[Point],
    hull_source: &[Point],
    area: f64,
    perimeter: f64,
) -> Result<(ContourFeatures, (u32, u32)), TrackError> {
    if perimeter <= 0.0 {
        return Err(TrackError::DegenerateContour("zero perimeter".to_string()));
    }

    let circularity = 4.0 * PI * area / (perimeter * perimeter);

    let (width, height) = primitives.bounding_box(polygon)?;
    let aspect_ratio = f64::from(width) / f64::from(height.max(1));

    let hull = primitives.convex_hull(hull_source)?;
    let hull_area = primitives.contour_area(&hull)?;
    let convexity = if hull_area > 0.0 { area / hull_area } else { 1.0 };

    let features = ContourFeatures {
        vertices: polygon.len(),
        circularity,
        aspect_ratio,
        convexity,
        area,
        perimeter,
    };
    Ok((features, (width, height)))
}
