//! Error types for Lumen Trace

use thiserror::Error;

/// Errors that can occur while tracking, classifying or exporting a trace
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Geometry primitive failed: {0}")]
    GeometryError(String),

    #[error("Degenerate contour: {0}")]
    DegenerateContour(String),

    #[error("Export failed: {0}")]
    ExportError(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Failed to parse observation: {0}")]
    ParseError(String),
}
