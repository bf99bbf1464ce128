//! End-to-end replay of recorded observations through a tracking session

use lumen_trace::encoder::TraceRecord;
use lumen_trace::pipeline::{replay_ndjson, FrameObservation, SessionRunner};
use lumen_trace::{
    FinalizeReason, MemorySink, Point, SessionConfig, ShapeLabel, TrackingMode,
};
use pretty_assertions::assert_eq;

const FRAME_MS: u64 = 33;

/// Closed loop through `corners`, walked in `step`-pixel increments
fn walk(corners: &[Point], step: i32) -> Vec<Point> {
    let mut points = Vec::new();
    for (i, &a) in corners.iter().enumerate() {
        let b = corners[(i + 1) % corners.len()];
        let length = (b.x - a.x).abs().max((b.y - a.y).abs());
        let steps = (length / step).max(1);
        for s in 0..steps {
            points.push(Point::new(
                a.x + (b.x - a.x) * s / steps,
                a.y + (b.y - a.y) * s / steps,
            ));
        }
    }
    points.push(corners[0]);
    points
}

fn rectangle() -> Vec<Point> {
    walk(
        &[
            Point::new(100, 100),
            Point::new(500, 100),
            Point::new(500, 200),
            Point::new(100, 200),
        ],
        20,
    )
}

/// Observations for a gesture starting at `start_ms`; returns the next free time
fn record(points: &[Point], start_ms: u64, out: &mut Vec<FrameObservation>) -> u64 {
    let mut t = start_ms;
    for p in points {
        out.push(FrameObservation::point(t, p.x, p.y));
        t += FRAME_MS;
    }
    t
}

/// Empty frames until `until_ms`
fn silence(start_ms: u64, until_ms: u64, out: &mut Vec<FrameObservation>) -> u64 {
    let mut t = start_ms;
    while t < until_ms {
        out.push(FrameObservation::empty(t));
        t += FRAME_MS;
    }
    t
}

#[test]
fn test_two_gestures_with_timeout_and_mode_switch() {
    let mut observations = Vec::new();

    // Gesture 1: a rectangle, then the light goes out
    let t = record(&rectangle(), 0, &mut observations);
    let t = silence(t, t + 2000, &mut observations);

    // Gesture 2: cursor movement, closed out by switching back to drawing
    observations.push(FrameObservation {
        mode: Some(TrackingMode::Cursor),
        ..FrameObservation::empty(t)
    });
    let cursor_path: Vec<Point> = (0..12).map(|i| Point::new(300 + 5 * i, 300)).collect();
    let t = record(&cursor_path, t + FRAME_MS, &mut observations);
    observations.push(FrameObservation {
        mode: Some(TrackingMode::Drawing),
        ..FrameObservation::empty(t)
    });

    let mut runner = SessionRunner::new(SessionConfig::default(), MemorySink::new()).unwrap();
    for obs in &observations {
        runner.process_observation(obs);
    }
    assert!(runner.finish().is_none());

    let summary = runner.summary();
    assert_eq!(summary.finalized, 2);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.export_failures, 0);

    let traces = runner.into_sink().into_traces();
    assert_eq!(traces[0].reason, FinalizeReason::Timeout);
    assert_eq!(traces[0].accepted_label(), Some(ShapeLabel::Rectangle));
    assert_eq!(traces[0].points.len(), rectangle().len());

    assert_eq!(
        traces[1].reason,
        FinalizeReason::ModeSwitch {
            from: TrackingMode::Cursor,
            to: TrackingMode::Drawing
        }
    );
    assert_eq!(traces[1].classification, None);
    assert_eq!(traces[1].points.points(), &cursor_path[..]);
}

#[test]
fn test_flicker_is_filtered_before_export() {
    let mut points = rectangle();
    points.insert(7, Point::new(900, 600));
    points.insert(30, Point::new(5, 700));

    let mut input = String::new();
    let mut observations = Vec::new();
    record(&points, 0, &mut observations);
    for obs in &observations {
        input.push_str(&serde_json::to_string(obs).unwrap());
        input.push('\n');
    }

    let records = replay_ndjson(&input, &SessionConfig::default()).unwrap();
    assert_eq!(records.len(), 1);

    let record: TraceRecord = serde_json::from_str(&records[0]).unwrap();
    assert_eq!(record.reason, FinalizeReason::EndOfStream);
    assert_eq!(record.raw_point_count, points.len());
    assert!(record.point_count < record.raw_point_count);
    assert!(!record.points.contains(&Point::new(900, 600)));
    assert!(!record.points.contains(&Point::new(5, 700)));
    assert_eq!(record.points[0], Point::new(100, 100));
    assert_eq!(
        record.classification.map(|c| c.label),
        Some(ShapeLabel::Rectangle)
    );
    assert!(record.accepted);
}

#[test]
fn test_clear_discards_gesture() {
    let mut observations = Vec::new();
    let t = record(&rectangle()[..20], 0, &mut observations);
    observations.push(FrameObservation {
        clear: true,
        ..FrameObservation::empty(t)
    });
    silence(t + FRAME_MS, t + 3000, &mut observations);

    let mut runner = SessionRunner::new(SessionConfig::default(), MemorySink::new()).unwrap();
    for obs in &observations {
        runner.process_observation(obs);
    }
    runner.finish();

    assert!(runner.sink().traces().is_empty());
}
