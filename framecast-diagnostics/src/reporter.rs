//! Periodic metrics logging

use framecast_core::{MetricsSnapshot, PipelineMetrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Logs a metrics line at a fixed interval until cancelled
#[derive(Debug)]
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    /// Create a reporter; intervals under 10ms are raised to 10ms
    pub fn new(metrics: Arc<PipelineMetrics>, interval: Duration) -> Self {
        Self {
            metrics,
            interval: interval.max(Duration::from_millis(10)),
        }
    }

    /// Run on the current runtime; the task resolves to the final snapshot
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<MetricsSnapshot> {
        tokio::spawn(self.run(cancel))
    }

    /// Log until `cancel` fires, then return the final snapshot
    pub async fn run(self, cancel: CancellationToken) -> MetricsSnapshot {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        let mut previous = self.metrics.snapshot();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => break,
            }

            let current = self.metrics.snapshot();
            log_window(&previous, &current, self.interval);
            previous = current;
        }

        self.metrics.snapshot()
    }
}

fn log_window(previous: &MetricsSnapshot, current: &MetricsSnapshot, window: Duration) {
    let uploaded = current
        .uploads_succeeded
        .saturating_sub(previous.uploads_succeeded);
    let fps = uploaded as f64 / window.as_secs_f64();

    info!(
        captured = current.frames_captured,
        encoded = current.frames_encoded,
        dropped = current.frames_dropped + current.frames_backlog_dropped,
        encode_failures = current.encode_failures,
        uploaded = current.uploads_succeeded,
        failed = current.uploads_failed,
        retries = current.upload_retries,
        window_fps = format!("{fps:.1}"),
        "Pipeline metrics"
    );
}
