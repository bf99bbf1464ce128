//! Tracking session state machine
//!
//! The session accumulates tracked points frame by frame and decides when a
//! trace is finished (no light for the configured timeout, a mode switch, or
//! the end of the stream). While drawing, a throttled preview classification
//! runs on a filtered copy of the trace without touching it.
//!
//! ```text
//!   Idle --point--> Accumulating --point/none--> Accumulating
//!                        |
//!                        +--timeout | mode switch | finish--> finalize --> Idle
//!   (any) --clear--> Idle
//! ```
//!
//! Time is passed in by the caller so transitions are testable without a
//! camera or sleeping.

use crate::analyzer::TraceAnalyzer;
use crate::classifier::ShapeClassifier;
use crate::config::SessionConfig;
use crate::error::TrackError;
use crate::geometry::{PlanarGeometry, VisionPrimitives};
use crate::outlier::OutlierFilter;
use crate::preview::PreviewWorker;
use crate::stats::PointDistanceStats;
use crate::throttle::FrameThrottle;
use crate::types::{
    ClassificationResult, FinalizeReason, FinalizedTrace, Point, PointTrace, TrackingMode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Traces shorter than this are finalized without outlier filtering
pub const MIN_POINTS_FOR_FILTERING: usize = 4;

/// Persistent phase of the session; finalizing is an action, not a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Accumulating,
}

/// Input events driving the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// One frame's detection result
    PointObserved(Option<Point>),
    /// Clock check for the no-light timeout
    Tick,
    ModeChanged(TrackingMode),
    Clear,
}

/// Observable output of a transition
#[derive(Debug, Clone)]
pub enum SessionEffect {
    /// A live preview reached the live confidence threshold
    Preview(ClassificationResult),
    /// A trace was closed out and should be exported
    Finalized(FinalizedTrace),
}

/// Everything the session mutates
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: SessionPhase,
    mode: TrackingMode,
    trace: PointTrace,
    last_point_at: Option<Instant>,
    throttle: FrameThrottle,
    last_preview: Option<ClassificationResult>,
    /// Bumped whenever the trace is discarded, to reject stale previews
    generation: u64,
}

impl SessionState {
    fn new(mode: TrackingMode, detection_interval: u32) -> Self {
        Self {
            phase: SessionPhase::Idle,
            mode,
            trace: PointTrace::new(),
            last_point_at: None,
            throttle: FrameThrottle::new(detection_interval),
            last_preview: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn trace(&self) -> &PointTrace {
        &self.trace
    }

    pub fn last_point_at(&self) -> Option<Instant> {
        self.last_point_at
    }

    pub fn last_preview(&self) -> Option<ClassificationResult> {
        self.last_preview
    }

    /// Drop the trace and everything derived from it, returning to Idle
    fn reset_trace(&mut self) -> PointTrace {
        self.phase = SessionPhase::Idle;
        self.last_point_at = None;
        self.last_preview = None;
        self.throttle.reset();
        self.generation += 1;
        self.trace.take()
    }
}

/// Stateful controller for one tracked light point
#[derive(Debug)]
pub struct TrackingSession<P = PlanarGeometry> {
    config: SessionConfig,
    analyzer: TraceAnalyzer<P>,
    state: SessionState,
    preview_worker: Option<PreviewWorker>,
}

impl Default for TrackingSession<PlanarGeometry> {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            analyzer: analyzer_for(&config, PlanarGeometry),
            state: SessionState::new(TrackingMode::default(), config.detection_interval_frames),
            preview_worker: None,
            config,
        }
    }
}

impl TrackingSession<PlanarGeometry> {
    /// Session over the built-in geometry backend
    pub fn new(config: SessionConfig) -> Result<Self, TrackError> {
        Self::with_primitives(config, PlanarGeometry)
    }
}

fn analyzer_for<P: VisionPrimitives>(config: &SessionConfig, primitives: P) -> TraceAnalyzer<P> {
    TraceAnalyzer::new(
        primitives,
        ShapeClassifier::with_epsilon_factor(config.epsilon_factor),
        config.stroke_width,
    )
}

impl<P> TrackingSession<P>
where
    P: VisionPrimitives + Clone + Send + 'static,
{
    /// Session over a caller-supplied geometry backend.
    ///
    /// Spawns the preview worker when `background_preview` is set.
    pub fn with_primitives(config: SessionConfig, primitives: P) -> Result<Self, TrackError> {
        config.validate()?;

        let analyzer = analyzer_for(&config, primitives);
        let preview_worker = if config.background_preview {
            Some(PreviewWorker::spawn(analyzer.clone())?)
        } else {
            None
        };

        Ok(Self {
            state: SessionState::new(TrackingMode::default(), config.detection_interval_frames),
            config,
            analyzer,
            preview_worker,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn mode(&self) -> TrackingMode {
        self.state.mode
    }

    pub fn trace(&self) -> &PointTrace {
        &self.state.trace
    }

    /// Most recent preview that reached the live threshold for the current trace
    pub fn last_preview(&self) -> Option<ClassificationResult> {
        self.state.last_preview
    }

    /// Apply one event at time `now`
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Option<SessionEffect> {
        match event {
            SessionEvent::PointObserved(point) => self.observe(point, now),
            SessionEvent::Tick => self.tick(now).map(SessionEffect::Finalized),
            SessionEvent::ModeChanged(mode) => self.set_mode(mode).map(SessionEffect::Finalized),
            SessionEvent::Clear => {
                self.clear();
                None
            }
        }
    }

    /// Record one frame's detection.
    ///
    /// A missing point neither ends nor extends the trace. While drawing,
    /// every Nth frame runs a preview once enough points are held.
    pub fn observe(&mut self, point: Option<Point>, now: Instant) -> Option<SessionEffect> {
        if let Some(point) = point {
            self.state.trace.push(point);
            self.state.last_point_at = Some(now);
            self.state.phase = SessionPhase::Accumulating;
        }

        if self.state.phase != SessionPhase::Accumulating || self.state.mode != TrackingMode::Drawing {
            return None;
        }

        let mut effect = self.poll_background_preview();

        let due = self.state.throttle.advance();
        if due && self.state.trace.len() >= self.config.min_points_for_detection {
            let filtered =
                OutlierFilter::filter_points(self.state.trace.points(), self.config.outlier_policy);

            match &self.preview_worker {
                Some(worker) => {
                    worker.submit(self.state.generation, filtered);
                }
                None => {
                    let result = self.analyzer.classify_trace(&filtered);
                    effect = self.publish_preview(result).or(effect);
                }
            }
        }

        effect
    }

    /// Finalize when no point has been seen for the configured timeout
    pub fn tick(&mut self, now: Instant) -> Option<FinalizedTrace> {
        if self.state.phase != SessionPhase::Accumulating {
            return None;
        }

        let last = self.state.last_point_at?;
        if now.saturating_duration_since(last) < self.config.no_light_timeout() {
            return None;
        }

        self.finalize(FinalizeReason::Timeout)
    }

    /// Switch tracking mode, finalizing any held trace under the old mode
    pub fn set_mode(&mut self, mode: TrackingMode) -> Option<FinalizedTrace> {
        let from = self.state.mode;
        if from == mode {
            return None;
        }

        let finalized = if self.state.trace.is_empty() {
            None
        } else {
            self.finalize(FinalizeReason::ModeSwitch { from, to: mode })
        };

        self.state.mode = mode;
        debug!(from = from.as_str(), to = mode.as_str(), "tracking mode changed");
        finalized
    }

    /// Discard the trace unconditionally
    pub fn clear(&mut self) {
        let discarded = self.state.reset_trace();
        if !discarded.is_empty() {
            debug!(points = discarded.len(), "trace cleared");
        }
    }

    /// Finalize whatever is held when the frame source ends
    pub fn finish(&mut self) -> Option<FinalizedTrace> {
        if self.state.trace.is_empty() {
            return None;
        }
        self.finalize(FinalizeReason::EndOfStream)
    }

    fn poll_background_preview(&mut self) -> Option<SessionEffect> {
        let outcome = self.preview_worker.as_ref()?.latest()?;
        if outcome.generation != self.state.generation {
            return None;
        }
        self.publish_preview(outcome.result)
    }

    fn publish_preview(&mut self, result: ClassificationResult) -> Option<SessionEffect> {
        if !result.meets(self.config.live_confidence_threshold) {
            debug!(
                label = %result.label,
                confidence = result.confidence,
                "preview below live threshold"
            );
            return None;
        }

        self.state.last_preview = Some(result);
        Some(SessionEffect::Preview(result))
    }

    /// Filter, classify and package the held trace, then return to Idle.
    ///
    /// Only traces gathered while drawing are classified, and only when the
    /// filtered trace still holds enough points.
    fn finalize(&mut self, reason: FinalizeReason) -> Option<FinalizedTrace> {
        let mode = self.state.mode;
        let raw = self.state.reset_trace();
        if raw.is_empty() {
            return None;
        }

        let raw_point_count = raw.len();
        let points = if raw_point_count >= MIN_POINTS_FOR_FILTERING {
            OutlierFilter::filter(&raw, self.config.outlier_policy)
        } else {
            raw
        };

        let classification = match mode {
            TrackingMode::Drawing if points.len() >= self.config.min_points_for_detection => {
                Some(self.analyzer.classify_trace(points.points()))
            }
            _ => None,
        };
        let accepted = classification
            .map(|result| result.meets(self.config.finalize_confidence_threshold))
            .unwrap_or(false);
        let statistics = PointDistanceStats::compute(points.points());
        let label = classification
            .map(|result| result.label.to_string())
            .unwrap_or_else(|| "none".to_string());

        info!(
            reason = ?reason,
            mode = mode.as_str(),
            raw_points = raw_point_count,
            kept_points = points.len(),
            label = %label,
            accepted,
            "trace finalized"
        );

        Some(FinalizedTrace {
            reason,
            mode,
            raw_point_count,
            points,
            statistics,
            classification,
            accepted,
            finished_at: Utc::now(),
        })
    }
}
