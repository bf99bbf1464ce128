//! Pipeline orchestration
//!
//! This module provides the public API for Lumen Trace. It drives a
//! [`TrackingSession`] from frames or recorded observations and hands every
//! finalized trace to an export sink.

use crate::analyzer::TraceAnalyzer;
use crate::classifier::{ApproximationLevel, ShapeAnalysis, ShapeClassifier};
use crate::config::SessionConfig;
use crate::error::TrackError;
use crate::export::{ExportSink, NdjsonSink};
use crate::frame::{BrightSpotDetector, Frame};
use crate::geometry::{PlanarGeometry, VisionPrimitives};
use crate::outlier::{FilterOutcome, OutlierFilter, OutlierPolicy};
use crate::session::{SessionEffect, TrackingSession, MIN_POINTS_FOR_FILTERING};
use crate::types::{ClassificationResult, FinalizedTrace, Point, TrackingMode};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One recorded frame: what the detector saw plus any control input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameObservation {
    /// Milliseconds since the start of the recording
    pub t_ms: u64,
    #[serde(default)]
    pub point: Option<Point>,
    /// Mode requested at this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TrackingMode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear: bool,
}

impl FrameObservation {
    pub fn point(t_ms: u64, x: i32, y: i32) -> Self {
        Self {
            t_ms,
            point: Some(Point::new(x, y)),
            mode: None,
            clear: false,
        }
    }

    pub fn empty(t_ms: u64) -> Self {
        Self {
            t_ms,
            point: None,
            mode: None,
            clear: false,
        }
    }

    pub fn from_json_line(line: &str) -> Result<Self, TrackError> {
        serde_json::from_str(line).map_err(|e| TrackError::ParseError(e.to_string()))
    }
}

/// Totals from a replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub frames: usize,
    pub previews: usize,
    pub finalized: usize,
    pub accepted: usize,
    pub export_failures: usize,
}

/// Drives a session and exports what it finalizes.
///
/// Export failures are logged and counted; they never stop the session.
pub struct SessionRunner<S, P = PlanarGeometry> {
    session: TrackingSession<P>,
    sink: S,
    detector: BrightSpotDetector,
    origin: Instant,
    summary: ReplaySummary,
}

impl<S: ExportSink> SessionRunner<S> {
    pub fn new(config: SessionConfig, sink: S) -> Result<Self, TrackError> {
        Ok(Self::with_session(TrackingSession::new(config)?, sink))
    }
}

impl<S, P> SessionRunner<S, P>
where
    S: ExportSink,
    P: VisionPrimitives + Clone + Send + 'static,
{
    pub fn with_session(session: TrackingSession<P>, sink: S) -> Self {
        Self {
            session,
            sink,
            detector: BrightSpotDetector::new(),
            origin: Instant::now(),
            summary: ReplaySummary::default(),
        }
    }

    /// Replace the frame detector (for a custom target color)
    pub fn with_detector(mut self, detector: BrightSpotDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn session(&self) -> &TrackingSession<P> {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn summary(&self) -> ReplaySummary {
        self.summary
    }

    /// Detect the light in a frame and advance the session
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> Vec<SessionEffect> {
        let point = self.detector.detect(frame);
        let mut effects = Vec::new();
        self.summary.frames += 1;

        let observed = self.session.observe(point, now);
        self.dispatch(observed, &mut effects);
        let ticked = self.session.tick(now).map(SessionEffect::Finalized);
        self.dispatch(ticked, &mut effects);
        effects
    }

    /// Apply one recorded observation.
    ///
    /// Order within a frame: clear, mode change, point, timeout check.
    pub fn process_observation(&mut self, observation: &FrameObservation) -> Vec<SessionEffect> {
        let now = self.origin + Duration::from_millis(observation.t_ms);
        let mut effects = Vec::new();
        self.summary.frames += 1;

        if observation.clear {
            self.session.clear();
        }
        if let Some(mode) = observation.mode {
            let switched = self.session.set_mode(mode).map(SessionEffect::Finalized);
            self.dispatch(switched, &mut effects);
        }

        let observed = self.session.observe(observation.point, now);
        self.dispatch(observed, &mut effects);
        let ticked = self.session.tick(now).map(SessionEffect::Finalized);
        self.dispatch(ticked, &mut effects);
        effects
    }

    /// Finalize any held trace at the end of the stream
    pub fn finish(&mut self) -> Option<FinalizedTrace> {
        let finalized = self.session.finish()?;
        self.export(&finalized);
        Some(finalized)
    }

    /// Replay NDJSON observations, finishing the session at end of input.
    ///
    /// Blank lines are skipped; a malformed line aborts the replay.
    pub fn replay<R: BufRead>(&mut self, reader: R) -> Result<ReplaySummary, TrackError> {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let observation: FrameObservation = serde_json::from_str(&line)
                .map_err(|e| TrackError::ParseError(format!("line {}: {}", index + 1, e)))?;
            self.process_observation(&observation);
        }

        self.finish();
        Ok(self.summary)
    }

    fn dispatch(&mut self, effect: Option<SessionEffect>, effects: &mut Vec<SessionEffect>) {
        let Some(effect) = effect else {
            return;
        };

        match &effect {
            SessionEffect::Preview(result) => {
                self.summary.previews += 1;
                debug!(label = %result.label, confidence = result.confidence, "live preview");
            }
            SessionEffect::Finalized(trace) => self.export(trace),
        }
        effects.push(effect);
    }

    fn export(&mut self, trace: &FinalizedTrace) {
        self.summary.finalized += 1;
        if trace.accepted {
            self.summary.accepted += 1;
        }

        if let Err(e) = self.sink.export(trace) {
            self.summary.export_failures += 1;
            warn!(error = %e, points = trace.points.len(), "trace export failed");
        }
    }
}

fn analyzer_for(config: &SessionConfig) -> TraceAnalyzer {
    TraceAnalyzer::new(
        PlanarGeometry,
        ShapeClassifier::with_epsilon_factor(config.epsilon_factor),
        config.stroke_width,
    )
}

fn filtered(points: &[Point], config: &SessionConfig) -> Vec<Point> {
    if points.len() >= MIN_POINTS_FOR_FILTERING {
        OutlierFilter::filter_points(points, config.outlier_policy)
    } else {
        points.to_vec()
    }
}

/// Run the outlier filter once over a recorded trace, with a removal report
pub fn filter_points(points: &[Point], policy: OutlierPolicy) -> FilterOutcome {
    OutlierFilter::filter_with_report(points, policy)
}

/// Filter a complete trace and report its shape analysis.
///
/// Returns `None` when the trace yields no contour.
pub fn analyze_points(
    points: &[Point],
    config: &SessionConfig,
) -> Result<Option<ShapeAnalysis>, TrackError> {
    config.validate()?;
    analyzer_for(config).analyze_trace(&filtered(points, config))
}

/// Filter and classify a complete trace the way a finalize would
pub fn classify_points(points: &[Point], config: &SessionConfig) -> ClassificationResult {
    analyzer_for(config).classify_trace(&filtered(points, config))
}

/// Simplify the contour of a trace at several epsilon factors
pub fn approximate_points(
    points: &[Point],
    config: &SessionConfig,
    factors: &[f64],
) -> Result<Vec<ApproximationLevel>, TrackError> {
    let geometry = PlanarGeometry;
    match geometry.trace_contour(&filtered(points, config), config.stroke_width)? {
        Some(contour) => ShapeClassifier::approximation_levels(&geometry, &contour, factors),
        None => Ok(Vec::new()),
    }
}

/// Replay NDJSON observations and return one JSON record per finalized trace.
///
/// # Example
/// ```ignore
/// let records = replay_ndjson(recording, &SessionConfig::default())?;
/// ```
pub fn replay_ndjson(input: &str, config: &SessionConfig) -> Result<Vec<String>, TrackError> {
    let mut runner = SessionRunner::new(config.clone(), NdjsonSink::new(Vec::new()))?;
    runner.replay(input.as_bytes())?;

    let output = String::from_utf8(runner.into_sink().into_inner())
        .map_err(|e| TrackError::ExportError(e.to_string()))?;
    Ok(output.lines().map(str::to_string).collect())
}
