//! Lumen Trace - Light-point tracking and drawn-shape recognition
//!
//! Lumen Trace follows a single bright point across a video stream, collects
//! its trajectory into a trace and classifies the finished trace as a drawn
//! shape: frame detection → session accumulation → outlier filtering →
//! contour extraction → shape classification → export.
//!
//! ## Modules
//!
//! - **Filtering**: distance statistics and IQR / Modified Z-score / Hybrid outlier removal
//! - **Classification**: vision primitives, contour features and the shape rule ladder
//! - **Session**: the tracking state machine, throttled live previews and export

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod frame;
pub mod geometry;
pub mod mask;
pub mod outlier;
pub mod pipeline;
pub mod preview;
pub mod session;
pub mod stats;
pub mod throttle;
pub mod types;

pub use analyzer::TraceAnalyzer;
pub use classifier::{ShapeAnalysis, ShapeClassifier};
pub use config::SessionConfig;
pub use error::TrackError;
pub use export::{ExportSink, MemorySink, NdjsonSink};
pub use geometry::{PlanarGeometry, VisionPrimitives};
pub use outlier::{OutlierFilter, OutlierPolicy};
pub use pipeline::{
    analyze_points, approximate_points, classify_points, filter_points, replay_ndjson,
    FrameObservation, SessionRunner,
};
pub use session::{SessionEffect, SessionEvent, SessionPhase, TrackingSession};
pub use stats::{DistanceStatistics, PointDistanceStats};
pub use types::{
    ClassificationResult, FinalizeReason, FinalizedTrace, Point, PointTrace, ShapeLabel,
    TrackingMode,
};

/// Crate version embedded in all trace records
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for trace records
pub const PRODUCER_NAME: &str = "lumen-trace";
