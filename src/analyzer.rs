//! Trace analysis
//!
//! Bridges a point trace to the shape classifier: the trace is handed to the
//! vision primitives to obtain a contour, and the contour is classified.
//! Collaborator failures stop here and become an `error` classification.

use crate::classifier::{ShapeAnalysis, ShapeClassifier};
use crate::error::TrackError;
use crate::geometry::{PlanarGeometry, VisionPrimitives};
use crate::types::{ClassificationResult, Point};
use tracing::warn;

/// Default stroke width (pixels) used when drawing a trace for contour extraction
pub const DEFAULT_STROKE_WIDTH: u32 = 5;

/// Classifies traces through a [`VisionPrimitives`] backend
#[derive(Debug, Clone)]
pub struct TraceAnalyzer<P = PlanarGeometry> {
    classifier: ShapeClassifier,
    primitives: P,
    stroke_width: u32,
}

impl Default for TraceAnalyzer<PlanarGeometry> {
    fn default() -> Self {
        Self::new(PlanarGeometry, ShapeClassifier::default(), DEFAULT_STROKE_WIDTH)
    }
}

impl<P: VisionPrimitives> TraceAnalyzer<P> {
    pub fn new(primitives: P, classifier: ShapeClassifier, stroke_width: u32) -> Self {
        Self {
            classifier,
            primitives,
            stroke_width,
        }
    }

    pub fn classifier(&self) -> &ShapeClassifier {
        &self.classifier
    }

    pub fn primitives(&self) -> &P {
        &self.primitives
    }

    /// Full analysis of a trace; `None` when no contour could be extracted
    pub fn analyze_trace(&self, points: &[Point]) -> Result<Option<ShapeAnalysis>, TrackError> {
        let contour = match self.primitives.trace_contour(points, self.stroke_width)? {
            Some(contour) if !contour.is_empty() => contour,
            _ => return Ok(None),
        };

        self.classifier
            .analyze_contour(&self.primitives, &contour)
            .map(Some)
    }

    /// Classify a trace, never failing.
    ///
    /// No contour yields `empty`; any collaborator error yields `error`.
    pub fn classify_trace(&self, points: &[Point]) -> ClassificationResult {
        match self.analyze_trace(points) {
            Ok(Some(analysis)) => analysis.result,
            Ok(None) => ClassificationResult::empty(),
            Err(e) => {
                warn!(error = %e, points = points.len(), "trace classification failed");
                ClassificationResult::error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::BinaryMask;
    use crate::types::ShapeLabel;

    /// Backend whose contour extraction always fails
    struct BrokenPrimitives;

    impl VisionPrimitives for BrokenPrimitives {
        fn simplify_to_polygon(&self, contour: &[Point], _: f64) -> Result<Vec<Point>, TrackError> {
            Ok(contour.to_vec())
        }
        fn contour_area(&self, _: &[Point]) -> Result<f64, TrackError> {
            Ok(0.0)
        }
        fn arc_length(&self, _: &[Point], _: bool) -> Result<f64, TrackError> {
            Ok(0.0)
        }
        fn convex_hull(&self, points: &[Point]) -> Result<Vec<Point>, TrackError> {
            Ok(points.to_vec())
        }
        fn bounding_box(&self, _: &[Point]) -> Result<(u32, u32), TrackError> {
            Ok((1, 1))
        }
        fn extract_largest_contour(&self, _: &BinaryMask) -> Result<Option<Vec<Point>>, TrackError> {
            Err(TrackError::GeometryError("contour finder crashed".to_string()))
        }
    }

    fn drawn_triangle() -> Vec<Point> {
        let corners = [Point::new(50, 50), Point::new(250, 50), Point::new(150, 223)];
        let mut trace = Vec::new();
        for i in 0..3 {
            let (a, b) = (corners[i], corners[(i + 1) % 3]);
            for step in 0..10 {
                let t = f64::from(step) / 10.0;
                trace.push(Point::new(
                    (f64::from(a.x) + t * f64::from(b.x - a.x)).round() as i32,
                    (f64::from(a.y) + t * f64::from(b.y - a.y)).round() as i32,
                ));
            }
        }
        trace.push(corners[0]);
        trace
    }

    #[test]
    fn test_classifies_drawn_triangle() {
        let analyzer = TraceAnalyzer::default();
        let result = analyzer.classify_trace(&drawn_triangle());
        assert_eq!(result.label, ShapeLabel::Triangle);
        assert!((result.confidence - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_empty_trace_is_empty() {
        let result = TraceAnalyzer::default().classify_trace(&[]);
        assert_eq!(result, ClassificationResult::empty());
    }

    #[test]
    fn test_collaborator_failure_is_error() {
        let analyzer = TraceAnalyzer::new(BrokenPrimitives, ShapeClassifier::default(), 5);
        let result = analyzer.classify_trace(&drawn_triangle());

        assert_eq!(result.label, ShapeLabel::Error);
        assert_eq!(result.confidence, 0.0);
        assert!(analyzer.analyze_trace(&drawn_triangle()).is_err());
    }

    #[test]
    fn test_trace_beyond_mask_limit_is_error() {
        let analyzer = TraceAnalyzer::default();
        let span = vec![Point::new(-2_000_000_000, 0), Point::new(2_000_000_000, 0)];
        assert_eq!(analyzer.classify_trace(&span), ClassificationResult::error());
        assert!(matches!(
            analyzer.analyze_trace(&span),
            Err(TrackError::GeometryError(_))
        ));

        let wide = vec![Point::new(0, 0), Point::new(60_000, 60_000), Point::new(0, 60_000)];
        assert_eq!(analyzer.classify_trace(&wide).label, ShapeLabel::Error);
    }

    #[test]
    fn test_short_stroke_is_too_small() {
        let trace = vec![Point::new(10, 10), Point::new(13, 10)];
        let result = TraceAnalyzer::default().classify_trace(&trace);
        assert_eq!(result.label, ShapeLabel::TooSmall);
    }
}
