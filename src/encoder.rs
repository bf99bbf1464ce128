//! Trace record encoding
//!
//! Turns a finalized trace into a self-describing JSON record carrying
//! producer metadata, a unique trace id and an RFC 3339 timestamp.

use crate::error::TrackError;
use crate::stats::DistanceStatistics;
use crate::types::{ClassificationResult, FinalizeReason, FinalizedTrace, Point, TrackingMode};
use crate::{PRODUCER_NAME, VERSION};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current trace record schema version
pub const RECORD_VERSION: &str = "1.0.0";

/// Who produced a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Exported form of a finalized trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub record_version: String,
    pub producer: RecordProducer,
    pub trace_id: String,
    pub finalized_at_utc: String,
    pub reason: FinalizeReason,
    pub mode: TrackingMode,
    pub raw_point_count: usize,
    pub point_count: usize,
    pub statistics: DistanceStatistics,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub classification: Option<ClassificationResult>,
    pub accepted: bool,
    pub points: Vec<Point>,
}

/// Encoder for producing trace records
#[derive(Debug, Clone)]
pub struct TraceEncoder {
    instance_id: String,
}

impl Default for TraceEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, trace: &FinalizedTrace) -> TraceRecord {
        TraceRecord {
            record_version: RECORD_VERSION.to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            trace_id: Uuid::new_v4().to_string(),
            finalized_at_utc: trace.finished_at.to_rfc3339(),
            reason: trace.reason,
            mode: trace.mode,
            raw_point_count: trace.raw_point_count,
            point_count: trace.points.len(),
            statistics: trace.statistics,
            classification: trace.classification,
            accepted: trace.accepted,
            points: trace.points.points().to_vec(),
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json(&self, trace: &FinalizedTrace) -> Result<String, TrackError> {
        Ok(serde_json::to_string_pretty(&self.encode(trace))?)
    }

    /// Encode to a single JSON line
    pub fn encode_to_line(&self, trace: &FinalizedTrace) -> Result<String, TrackError> {
        Ok(serde_json::to_string(&self.encode(trace))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PointDistanceStats;
    use crate::types::{PointTrace, ShapeLabel};
    use chrono::{TimeZone, Utc};

    fn make_finalized() -> FinalizedTrace {
        let points: PointTrace = (0..12).map(|i| Point::new(i * 10, 0)).collect();
        FinalizedTrace {
            reason: FinalizeReason::Timeout,
            mode: TrackingMode::Drawing,
            raw_point_count: 13,
            statistics: PointDistanceStats::compute(points.points()),
            points,
            classification: Some(ClassificationResult::new(ShapeLabel::Rectangle, 0.88)),
            accepted: true,
            finished_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_encode_record() {
        let encoder = TraceEncoder::with_instance_id("test-instance".to_string());
        let record = encoder.encode(&make_finalized());

        assert_eq!(record.record_version, RECORD_VERSION);
        assert_eq!(record.producer.name, PRODUCER_NAME);
        assert_eq!(record.producer.instance_id, "test-instance");
        assert_eq!(record.finalized_at_utc, "2024-03-01T12:30:00+00:00");
        assert_eq!(record.point_count, 12);
        assert_eq!(record.raw_point_count, 13);
        assert!(Uuid::parse_str(&record.trace_id).is_ok());
        assert!(record.accepted);
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let encoder = TraceEncoder::new();
        let trace = make_finalized();
        assert_ne!(encoder.encode(&trace).trace_id, encoder.encode(&trace).trace_id);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = TraceEncoder::new();
        let json = encoder.encode_to_json(&make_finalized()).unwrap();

        assert!(json.contains("\"record_version\""));
        assert!(json.contains("\"label\": \"rectangle\""));
        assert!(json.contains("\"kind\": \"timeout\""));

        let parsed: TraceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.points.len(), 12);
    }

    #[test]
    fn test_positions_only_record_omits_classification() {
        let mut trace = make_finalized();
        trace.mode = TrackingMode::Cursor;
        trace.classification = None;
        trace.accepted = false;

        let line = TraceEncoder::new().encode_to_line(&trace).unwrap();
        assert!(!line.contains('\n'));
        assert!(!line.contains("classification"));
        assert!(line.contains("\"mode\":\"cursor\""));
    }
}
