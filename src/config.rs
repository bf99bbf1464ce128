//! Session configuration
//!
//! Every tunable of the tracking session in one serde struct, persisted as
//! JSON the same way the rest of the crate's state is.

use crate::analyzer::DEFAULT_STROKE_WIDTH;
use crate::classifier::DEFAULT_EPSILON_FACTOR;
use crate::error::TrackError;
use crate::outlier::OutlierPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gap without a light point after which an accumulating trace is finalized
pub const DEFAULT_NO_LIGHT_TIMEOUT_MS: u64 = 1500;

/// Frames between live preview classifications
pub const DEFAULT_DETECTION_INTERVAL: u32 = 15;

/// Minimum (filtered) trace length before classification is attempted
pub const DEFAULT_MIN_POINTS_FOR_DETECTION: usize = 10;

/// Minimum confidence for a preview to be published
pub const DEFAULT_LIVE_CONFIDENCE_THRESHOLD: f64 = 0.40;

/// Minimum confidence for a finalized classification to be accepted
pub const DEFAULT_FINALIZE_CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Tracking session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub outlier_policy: OutlierPolicy,
    /// Simplification tolerance as a fraction of contour perimeter
    pub epsilon_factor: f64,
    pub no_light_timeout_ms: u64,
    pub detection_interval_frames: u32,
    pub min_points_for_detection: usize,
    pub live_confidence_threshold: f64,
    pub finalize_confidence_threshold: f64,
    /// Stroke width (pixels) used when rasterising a trace
    pub stroke_width: u32,
    /// Run live previews on a worker thread instead of inline
    pub background_preview: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outlier_policy: OutlierPolicy::default(),
            epsilon_factor: DEFAULT_EPSILON_FACTOR,
            no_light_timeout_ms: DEFAULT_NO_LIGHT_TIMEOUT_MS,
            detection_interval_frames: DEFAULT_DETECTION_INTERVAL,
            min_points_for_detection: DEFAULT_MIN_POINTS_FOR_DETECTION,
            live_confidence_threshold: DEFAULT_LIVE_CONFIDENCE_THRESHOLD,
            finalize_confidence_threshold: DEFAULT_FINALIZE_CONFIDENCE_THRESHOLD,
            stroke_width: DEFAULT_STROKE_WIDTH,
            background_preview: false,
        }
    }
}

impl SessionConfig {
    pub fn no_light_timeout(&self) -> Duration {
        Duration::from_millis(self.no_light_timeout_ms)
    }

    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> Result<(), TrackError> {
        if !(self.epsilon_factor.is_finite() && self.epsilon_factor > 0.0) {
            return Err(invalid(format!(
                "epsilon_factor must be positive, got {}",
                self.epsilon_factor
            )));
        }

        for (name, value) in [
            ("live_confidence_threshold", self.live_confidence_threshold),
            ("finalize_confidence_threshold", self.finalize_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }

        if self.live_confidence_threshold > self.finalize_confidence_threshold {
            return Err(invalid(format!(
                "live_confidence_threshold ({}) exceeds finalize_confidence_threshold ({})",
                self.live_confidence_threshold, self.finalize_confidence_threshold
            )));
        }

        if self.detection_interval_frames == 0 {
            return Err(invalid("detection_interval_frames must be at least 1".to_string()));
        }

        let policy_ok = match self.outlier_policy {
            OutlierPolicy::Iqr { multiplier } => multiplier > 0.0,
            OutlierPolicy::ModifiedZScore { threshold } => threshold > 0.0,
            OutlierPolicy::Hybrid {
                iqr_multiplier,
                z_threshold,
                max_iterations,
            } => iqr_multiplier > 0.0 && z_threshold > 0.0 && max_iterations > 0,
        };
        if !policy_ok {
            return Err(invalid(format!(
                "{} policy parameters must be positive",
                self.outlier_policy.name()
            )));
        }

        Ok(())
    }

    /// Load and validate a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, TrackError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn invalid(message: String) -> TrackError {
    TrackError::InvalidConfig(message)
}
