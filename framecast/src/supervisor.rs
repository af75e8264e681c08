//! Pipeline lifecycle
//!
//! A running pipeline is three kinds of task wired together:
//!
//! - the capture task ticks at the target rate and hands raw frames to the
//!   encode stage through a bounded channel, never waiting on it;
//! - the encode task compresses frames off the executor and pushes them into
//!   the [`UploadQueue`];
//! - a pool of [`UploadWorker`]s pulls from the queue and delivers.
//!
//! One [`CancellationToken`] reaches every task and a second one, fired when
//! the shutdown grace period runs out, abandons work still in flight.
//! [`Supervisor::stop`] returns only after each task has finished, and every
//! abandoned frame is counted.

use crate::config::{PipelineConfig, ShutdownPolicy};
use crate::event::{DropReason, EventStream, PipelineEvent};
use framecast_core::{
    FramecastError, FramecastResult, Frame, MetricsSnapshot, PipelineMetrics, PushOutcome,
    UploadQueue,
};
use framecast_diagnostics::PipelineReport;
use framecast_media::{
    AsyncEncoder, FrameEncoder, FrameSource, ImageEncoder, MediaError, ReadinessWatcher,
};
use framecast_upload::{HttpTransport, UploadTransport, UploadWorker, WorkerSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Fluent builder for a pipeline
#[derive(Default)]
pub struct SupervisorBuilder {
    config: PipelineConfig,
    source: Option<Box<dyn FrameSource>>,
    encoder: Option<Arc<dyn FrameEncoder>>,
    transport: Option<Arc<dyn UploadTransport>>,
}

impl std::fmt::Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("config", &self.config)
            .field("source", &self.source.as_ref().map(|s| s.device_name()))
            .field("encoder", &self.encoder)
            .field("transport", &self.transport)
            .finish()
    }
}

impl SupervisorBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Upload endpoint URL
    pub fn endpoint(mut self, url: &str) -> Self {
        self.config.endpoint = url.to_string();
        self
    }

    /// Capture ticks per second
    pub fn frame_rate(mut self, fps: f64) -> Self {
        self.config.target_frame_rate = fps;
        self
    }

    /// Upload queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Policy applied when the queue is full
    pub fn drop_policy(mut self, policy: framecast_core::DropPolicy) -> Self {
        self.config.drop_policy = policy;
        self
    }

    /// Upload worker count
    pub fn workers(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Retries per frame after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// First backoff delay; the cap is raised to match if needed
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base_ms = base.as_millis() as u64;
        self.config.max_backoff_ms = self.config.max_backoff_ms.max(self.config.backoff_base_ms);
        self
    }

    /// What `stop` does with queued frames
    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown_policy = policy;
        self
    }

    /// How long `stop` waits before abandoning work in flight
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config.grace_period_ms = grace.as_millis() as u64;
        self
    }

    /// Poll interval while the device is unavailable
    pub fn device_retry(mut self, interval: Duration) -> Self {
        self.config.device_retry_ms = interval.as_millis() as u64;
        self
    }

    /// Frame source (required)
    pub fn source(mut self, source: impl FrameSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Use this encoder instead of one built from the configuration
    pub fn encoder(mut self, encoder: Arc<dyn FrameEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Use this transport instead of HTTP to the configured endpoint
    pub fn transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate, wire and spawn the pipeline on the current Tokio runtime
    pub fn start(self) -> FramecastResult<Supervisor> {
        let source = self
            .source
            .ok_or_else(|| FramecastError::invalid_config("source", "a frame source is required"))?;
        Supervisor::spawn(self.config, source, self.encoder, self.transport)
    }
}

/// Owner of a running pipeline
#[derive(Debug)]
pub struct Supervisor {
    config: PipelineConfig,
    cancel: CancellationToken,
    capture_cancel: CancellationToken,
    halt: CancellationToken,
    queue: Arc<UploadQueue>,
    metrics: Arc<PipelineMetrics>,
    events: broadcast::Sender<PipelineEvent>,
    readiness: ReadinessWatcher,
    capture_task: JoinHandle<()>,
    encode_task: JoinHandle<()>,
    workers: JoinSet<WorkerSummary>,
}

impl Supervisor {
    /// Start building a pipeline
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Start a pipeline that posts to `config.endpoint` over HTTP
    pub fn start(config: PipelineConfig, source: impl FrameSource + 'static) -> FramecastResult<Self> {
        Self::spawn(config, Box::new(source), None, None)
    }

    fn spawn(
        config: PipelineConfig,
        source: Box<dyn FrameSource>,
        encoder: Option<Arc<dyn FrameEncoder>>,
        transport: Option<Arc<dyn UploadTransport>>,
    ) -> FramecastResult<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|e| FramecastError::Initialization {
            reason: format!("no Tokio runtime: {e}"),
        })?;

        let encoder: Arc<dyn FrameEncoder> = match encoder {
            Some(encoder) => encoder,
            None => Arc::new(ImageEncoder::new(config.encoder_config()).map_err(|e| {
                FramecastError::Initialization {
                    reason: format!("encoder: {e}"),
                }
            })?),
        };
        let transport: Arc<dyn UploadTransport> = match transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.transport_config()).map_err(|e| {
                FramecastError::Initialization {
                    reason: format!("transport: {e}"),
                }
            })?),
        };

        let cancel = CancellationToken::new();
        let capture_cancel = cancel.child_token();
        let halt = CancellationToken::new();
        let queue = Arc::new(UploadQueue::new(config.queue_capacity, config.drop_policy));
        let metrics = Arc::new(PipelineMetrics::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let readiness = source.readiness();
        let (frame_tx, frame_rx) = mpsc::channel(config.queue_capacity);

        let capture_task = tokio::spawn(
            CaptureLoop {
                source,
                frames: frame_tx,
                interval: config.frame_interval(),
                device_retry: config.device_retry(),
                metrics: metrics.clone(),
                events: events.clone(),
                cancel: capture_cancel.clone(),
            }
            .run(),
        );

        let encode_task = tokio::spawn(
            EncodeLoop {
                frames: frame_rx,
                encoder: AsyncEncoder::new(encoder),
                queue: queue.clone(),
                metrics: metrics.clone(),
                events: events.clone(),
                cancel: cancel.clone(),
                halt: halt.clone(),
            }
            .run(),
        );

        let mut workers = JoinSet::new();
        for id in 0..config.worker_count {
            let worker =
                UploadWorker::new(id, transport.clone(), config.retry_policy(), cancel.clone())
                    .with_halt(halt.clone());
            let metrics = metrics.clone();
            let events = events.clone();
            workers.spawn(worker.run(queue.clone(), move |result| {
                metrics.record_upload(result.success, result.retries());
                let _ = events.send(PipelineEvent::UploadCompleted(result));
            }));
        }

        info!(
            endpoint = %config.endpoint,
            frame_rate = config.target_frame_rate,
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            drop_policy = ?config.drop_policy,
            "Pipeline started"
        );
        let _ = events.send(PipelineEvent::Started {
            workers: config.worker_count,
            frame_rate: config.target_frame_rate,
        });

        Ok(Self {
            config,
            cancel,
            capture_cancel,
            halt,
            queue,
            metrics,
            events,
            readiness,
            capture_task,
            encode_task,
            workers,
        })
    }

    /// Configuration the pipeline was started with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared counters, e.g. for a [`framecast_diagnostics::MetricsReporter`]
    pub fn metrics_handle(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Subscribe to pipeline events from now on
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Frames waiting in the upload queue
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// False once `stop` has begun
    pub fn is_running(&self) -> bool {
        !self.capture_cancel.is_cancelled()
    }

    /// Health report for logging or export
    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            generated_at: chrono::Utc::now(),
            running: self.is_running(),
            device_ready: self.readiness.is_ready(),
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Shut the pipeline down and return the final metrics.
    ///
    /// Capture stops first. Under [`ShutdownPolicy::Drain`] the encoder and
    /// workers finish what is already in flight; under
    /// [`ShutdownPolicy::Discard`] queued frames are dropped and backoffs are
    /// cut short. Either way, uploads and encodes still running when the grace
    /// period ends are abandoned and counted as failed or discarded, and every
    /// task has terminated when this returns.
    pub async fn stop(mut self) -> MetricsSnapshot {
        let deadline = Instant::now() + self.config.grace_period();
        info!(policy = ?self.config.shutdown_policy, "Stopping pipeline");

        self.capture_cancel.cancel();
        if let Err(e) = (&mut self.capture_task).await {
            warn!("Capture task ended abnormally: {}", e);
        }

        let mut encode_finished = false;
        match self.config.shutdown_policy {
            ShutdownPolicy::Drain => {
                match tokio::time::timeout_at(deadline, &mut self.encode_task).await {
                    Ok(result) => {
                        encode_finished = true;
                        if let Err(e) = result {
                            warn!("Encode task ended abnormally: {}", e);
                        }
                    }
                    Err(_) => {
                        warn!("Encoder did not drain within the grace period");
                        self.cancel.cancel();
                    }
                }
                self.queue.close();
            }
            ShutdownPolicy::Discard => {
                self.cancel.cancel();
                self.discard_queued();
                self.queue.close();
            }
        }

        self.join_workers(deadline).await;
        self.cancel.cancel();

        if !encode_finished {
            if tokio::time::timeout_at(deadline, &mut self.encode_task).await.is_err() {
                warn!("Grace period elapsed, abandoning frame being encoded");
                self.halt.cancel();
            }
            // Cancel ends the encode loop between frames, halt within one
            if let Err(e) = (&mut self.encode_task).await {
                warn!("Encode task ended abnormally: {}", e);
            }
        }
        self.discard_queued();

        let snapshot = self.metrics.snapshot();
        info!(
            captured = snapshot.frames_captured,
            uploaded = snapshot.uploads_succeeded,
            failed = snapshot.uploads_failed,
            dropped = snapshot.frames_dropped + snapshot.frames_backlog_dropped,
            discarded = snapshot.frames_discarded,
            "Pipeline stopped"
        );
        let _ = self.events.send(PipelineEvent::Stopped {
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    fn discard_queued(&self) {
        let discarded = self.queue.clear();
        if discarded > 0 {
            debug!(discarded, "Discarded queued frames");
            self.metrics.record_discarded(discarded as u64);
        }
    }

    /// Wait for workers until `deadline`, then halt the rest.
    ///
    /// Halted workers report their in-flight frame as a cancelled upload
    /// before returning, so the join after the halt is bounded.
    async fn join_workers(&mut self, deadline: Instant) {
        let mut halted = false;
        loop {
            let joined = if halted {
                self.workers.join_next().await
            } else {
                match tokio::time::timeout_at(deadline, self.workers.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            remaining = self.workers.len(),
                            "Grace period elapsed, abandoning in-flight uploads"
                        );
                        self.cancel.cancel();
                        self.halt.cancel();
                        halted = true;
                        continue;
                    }
                }
            };

            match joined {
                Some(Ok(summary)) => debug!(
                    worker = summary.worker_id,
                    uploaded = summary.uploaded,
                    failed = summary.failed,
                    last_sequence = ?summary.last_sequence,
                    "Upload worker finished"
                ),
                Some(Err(e)) => warn!("Upload worker ended abnormally: {}", e),
                None => return,
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Stopped without `stop()`: tear everything down
        self.cancel.cancel();
        self.halt.cancel();
        self.capture_task.abort();
        self.encode_task.abort();
    }
}

struct CaptureLoop {
    source: Box<dyn FrameSource>,
    frames: mpsc::Sender<Frame>,
    interval: Duration,
    device_retry: Duration,
    metrics: Arc<PipelineMetrics>,
    events: broadcast::Sender<PipelineEvent>,
    cancel: CancellationToken,
}

impl CaptureLoop {
    async fn run(mut self) {
        let device = self.source.device_name().to_string();
        let mut readiness = self.source.readiness();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut suspended = false;

        debug!(device = %device, "Capture loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel.cancelled() => break,
            }

            match self.source.next_frame() {
                Ok(frame) => {
                    if suspended {
                        suspended = false;
                        info!(device = %device, "Capture device resumed");
                        let _ = self.events.send(PipelineEvent::DeviceResumed {
                            device: device.clone(),
                        });
                    }
                    if !self.hand_off(frame) {
                        break;
                    }
                }
                Err(MediaError::NoFrameAvailable { .. }) => {}
                Err(MediaError::DeviceUnavailable { reason, .. }) => {
                    if !suspended {
                        suspended = true;
                        self.metrics.record_device_suspension();
                        warn!(device = %device, reason = %reason, "Capture device unavailable, suspending");
                        let _ = self.events.send(PipelineEvent::DeviceSuspended {
                            device: device.clone(),
                            reason,
                        });
                    }

                    tokio::select! {
                        _ = readiness.wait_ready() => {}
                        _ = tokio::time::sleep(self.device_retry) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
                Err(e) => warn!(device = %device, "Capture failed: {}", e),
            }
        }
        debug!(device = %device, "Capture loop stopped");
    }

    /// Returns false once the encode stage is gone
    fn hand_off(&self, frame: Frame) -> bool {
        let sequence = frame.sequence;
        self.metrics.record_captured();

        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_backlog_dropped();
                debug!(sequence, "Encoder backlog full, dropping frame");
                let _ = self.events.send(PipelineEvent::FrameDropped {
                    sequence,
                    reason: DropReason::EncoderBacklog,
                });
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_discarded(1);
                false
            }
        }
    }
}

struct EncodeLoop {
    frames: mpsc::Receiver<Frame>,
    encoder: AsyncEncoder,
    queue: Arc<UploadQueue>,
    metrics: Arc<PipelineMetrics>,
    events: broadcast::Sender<PipelineEvent>,
    cancel: CancellationToken,
    halt: CancellationToken,
}

impl EncodeLoop {
    async fn run(mut self) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.discard_pending();
                    break;
                }
                frame = self.frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if !self.encode(frame).await {
                self.metrics.record_discarded(1);
                self.discard_pending();
                break;
            }
        }
        debug!("Encode loop stopped");
    }

    /// Returns false when the frame was abandoned on halt
    async fn encode(&self, frame: Frame) -> bool {
        let sequence = frame.sequence;
        let encoded = tokio::select! {
            biased;
            _ = self.halt.cancelled() => {
                debug!(sequence, "Encode abandoned on shutdown");
                return false;
            }
            encoded = self.encoder.encode(frame) => encoded,
        };
        match encoded {
            Ok(encoded) => {
                self.metrics.record_encoded();
                debug!(sequence, bytes = encoded.len(), "Frame encoded");
                match self.queue.push(encoded) {
                    PushOutcome::Enqueued => {}
                    PushOutcome::EvictedOldest(dropped) | PushOutcome::RejectedNewest(dropped) => {
                        self.metrics.record_dropped();
                        let _ = self.events.send(PipelineEvent::FrameDropped {
                            sequence: dropped,
                            reason: DropReason::QueueFull,
                        });
                    }
                    PushOutcome::Closed(_) => self.metrics.record_discarded(1),
                }
            }
            Err(e) => {
                self.metrics.record_encode_failure();
                warn!(sequence, "Dropping frame that failed to encode: {}", e);
                let _ = self.events.send(PipelineEvent::EncodeFailed {
                    sequence,
                    reason: e.to_string(),
                });
            }
        }
        true
    }

    fn discard_pending(&mut self) {
        let mut discarded = 0u64;
        while self.frames.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            self.metrics.record_discarded(discarded);
        }
    }
}
