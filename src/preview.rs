//! Background live-preview classification
//!
//! Preview classification must not stall the frame loop. The worker owns a
//! copy of the analyzer and receives jobs over a channel of capacity 1; when
//! the worker is busy the job is dropped and the caller keeps whatever
//! result it already has.

use crate::analyzer::TraceAnalyzer;
use crate::error::TrackError;
use crate::geometry::VisionPrimitives;
use crate::types::{ClassificationResult, Point};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

struct PreviewJob {
    generation: u64,
    points: Vec<Point>,
}

/// A completed preview, tagged with the trace generation it was computed for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOutcome {
    pub generation: u64,
    pub result: ClassificationResult,
}

/// Single worker thread running preview classifications
pub struct PreviewWorker {
    jobs: Option<SyncSender<PreviewJob>>,
    results: Receiver<PreviewOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    pub fn spawn<P>(analyzer: TraceAnalyzer<P>) -> Result<Self, TrackError>
    where
        P: VisionPrimitives + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::sync_channel::<PreviewJob>(1);
        let (result_tx, result_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("lumen-preview".to_string())
            .spawn(move || {
                for job in job_rx {
                    let result = analyzer.classify_trace(&job.points);
                    let outcome = PreviewOutcome {
                        generation: job.generation,
                        result,
                    };
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                debug!("preview worker stopped");
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queue a preview job; returns false when it was dropped
    pub fn submit(&self, generation: u64, points: Vec<Point>) -> bool {
        let Some(jobs) = &self.jobs else {
            return false;
        };

        match jobs.try_send(PreviewJob { generation, points }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(generation, "preview worker busy, job dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Most recent completed preview, discarding older ones
    pub fn latest(&self) -> Option<PreviewOutcome> {
        self.results.try_iter().last()
    }

    /// Block up to `timeout` for the next completed preview
    pub fn wait(&self, timeout: Duration) -> Option<PreviewOutcome> {
        match self.results.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for PreviewWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewWorker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}
