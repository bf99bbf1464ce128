//! Export sinks for finalized traces
//!
//! The session hands every finalized trace to an [`ExportSink`]. What the
//! sink does with it (a log line, a file, a message queue) is its own
//! business; a failing sink never affects the session.

use crate::encoder::TraceEncoder;
use crate::error::TrackError;
use crate::types::FinalizedTrace;
use std::io::Write;

/// Destination for finalized traces
pub trait ExportSink {
    fn export(&mut self, trace: &FinalizedTrace) -> Result<(), TrackError>;
}

impl<S: ExportSink + ?Sized> ExportSink for &mut S {
    fn export(&mut self, trace: &FinalizedTrace) -> Result<(), TrackError> {
        (**self).export(trace)
    }
}

impl<S: ExportSink + ?Sized> ExportSink for Box<S> {
    fn export(&mut self, trace: &FinalizedTrace) -> Result<(), TrackError> {
        (**self).export(trace)
    }
}

/// Writes one JSON trace record per line
pub struct NdjsonSink<W: Write> {
    writer: W,
    encoder: TraceEncoder,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_encoder(writer, TraceEncoder::new())
    }

    pub fn with_encoder(writer: W, encoder: TraceEncoder) -> Self {
        Self { writer, encoder }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ExportSink for NdjsonSink<W> {
    fn export(&mut self, trace: &FinalizedTrace) -> Result<(), TrackError> {
        let line = self.encoder.encode_to_line(trace)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps finalized traces in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    traces: Vec<FinalizedTrace>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> &[FinalizedTrace] {
        &self.traces
    }

    pub fn into_traces(self) -> Vec<FinalizedTrace> {
        self.traces
    }
}

impl ExportSink for MemorySink {
    fn export(&mut self, trace: &FinalizedTrace) -> Result<(), TrackError> {
        self.traces.push(trace.clone());
        Ok(())
    }
}
