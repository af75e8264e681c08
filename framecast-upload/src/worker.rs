//! Retrying upload worker

use crate::error::UploadErrorKind;
use crate::protocol::UploadResult;
use crate::transport::UploadTransport;
use framecast_core::{EncodedFrame, RetryPolicy, UploadQueue};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one worker's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Worker that produced the summary
    pub worker_id: usize,
    /// Frames delivered
    pub uploaded: u64,
    /// Frames that ended in failure, including abandoned ones
    pub failed: u64,
    /// Sequence of the last frame this worker finished
    pub last_sequence: Option<u64>,
}

/// Takes frames from the upload queue and delivers them one at a time
#[derive(Debug, Clone)]
pub struct UploadWorker {
    id: usize,
    transport: Arc<dyn UploadTransport>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    halt: CancellationToken,
}

impl UploadWorker {
    /// Create a worker.
    ///
    /// `cancel` stops it taking new frames and cuts backoffs short.
    pub fn new(
        id: usize,
        transport: Arc<dyn UploadTransport>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            transport,
            retry,
            cancel,
            halt: CancellationToken::new(),
        }
    }

    /// Abandon any attempt on the wire once `halt` is cancelled
    pub fn with_halt(mut self, halt: CancellationToken) -> Self {
        self.halt = halt;
        self
    }

    /// Worker identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Deliver one frame, retrying transient failures with backoff.
    ///
    /// The cancel token is observed while waiting out a backoff; an attempt
    /// already on the wire runs to completion unless the halt token fires.
    /// Either way the frame ends with a [`UploadErrorKind::Cancelled`] failure.
    pub async fn upload(&self, frame: &EncodedFrame) -> UploadResult {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let sent = tokio::select! {
                biased;
                _ = self.halt.cancelled() => {
                    warn!(
                        worker = self.id,
                        sequence = frame.sequence,
                        attempts,
                        "Upload abandoned on shutdown"
                    );
                    return self.failure(frame, UploadErrorKind::Cancelled, attempts, started);
                }
                sent = self.transport.send(frame) => sent,
            };
            let err = match sent {
                Ok(delivery) => {
                    info!(
                        worker = self.id,
                        sequence = frame.sequence,
                        status = delivery.status,
                        attempts,
                        reply = ?delivery.reply,
                        "Frame uploaded"
                    );
                    return UploadResult {
                        sequence: frame.sequence,
                        success: true,
                        http_status: Some(delivery.status),
                        error: None,
                        attempts,
                        worker_id: self.id,
                        reply: delivery.reply,
                        elapsed: started.elapsed(),
                    };
                }
                Err(err) => err,
            };

            if !err.is_transient() || !self.retry.should_retry(attempts) {
                warn!(
                    worker = self.id,
                    sequence = frame.sequence,
                    attempts,
                    "Upload failed: {}",
                    err
                );
                return self.failure(frame, err.into_kind(), attempts, started);
            }

            let delay = self.retry.delay_for(attempts);
            debug!(
                worker = self.id,
                sequence = frame.sequence,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying upload: {}",
                err
            );

            let abandoned = tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = self.cancel.cancelled() => true,
                _ = self.halt.cancelled() => true,
            };
            if abandoned {
                debug!(worker = self.id, sequence = frame.sequence, "Retry abandoned on shutdown");
                return self.failure(frame, UploadErrorKind::Cancelled, attempts, started);
            }
        }
    }

    fn failure(
        &self,
        frame: &EncodedFrame,
        kind: UploadErrorKind,
        attempts: u32,
        started: Instant,
    ) -> UploadResult {
        UploadResult {
            sequence: frame.sequence,
            success: false,
            http_status: kind.http_status(),
            error: Some(kind),
            attempts,
            worker_id: self.id,
            reply: None,
            elapsed: started.elapsed(),
        }
    }

    /// Upload frames until the queue is closed and empty, or cancellation.
    ///
    /// `report` is called with every finished upload, in completion order.
    pub async fn run<F>(self, queue: Arc<UploadQueue>, mut report: F) -> WorkerSummary
    where
        F: FnMut(UploadResult) + Send,
    {
        let mut summary = WorkerSummary {
            worker_id: self.id,
            ..WorkerSummary::default()
        };
        debug!(worker = self.id, "Upload worker started");

        while let Some(frame) = queue.pop_wait(&self.cancel).await {
            let result = self.upload(&frame).await;
            if result.success {
                summary.uploaded += 1;
            } else {
                summary.failed += 1;
            }
            summary.last_sequence = Some(result.sequence);
            report(result);
        }

        debug!(
            worker = self.id,
            uploaded = summary.uploaded,
            failed = summary.failed,
            "Upload worker stopped"
        );
        summary
    }
}
