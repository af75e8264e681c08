//! Pipeline counters and snapshots
//!
//! Every stage records outcomes here instead of propagating per-frame
//! failures to the caller. Counters are plain atomics so capture, encode and
//! upload tasks can update them without coordination.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared, lock-free pipeline counters
#[derive(Debug)]
pub struct PipelineMetrics {
    frames_captured: AtomicU64,
    frames_encoded: AtomicU64,
    frames_dropped: AtomicU64,
    frames_backlog_dropped: AtomicU64,
    encode_failures: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    upload_retries: AtomicU64,
    frames_discarded: AtomicU64,
    device_suspensions: AtomicU64,
    started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create zeroed counters; uptime starts now
    pub fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_backlog_dropped: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            uploads_succeeded: AtomicU64::new(0),
            uploads_failed: AtomicU64::new(0),
            upload_retries: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
            device_suspensions: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// A frame taken from the source
    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame encoded successfully
    pub fn record_encoded(&self) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame lost to the queue's drop policy
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame lost because the encode stage was still busy
    pub fn record_backlog_dropped(&self) {
        self.frames_backlog_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame the encoder rejected
    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished upload and the retries it took
    pub fn record_upload(&self, success: bool, retries: u32) {
        if success {
            self.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.uploads_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.upload_retries
            .fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    /// Frames thrown away by a discarding shutdown
    pub fn record_discarded(&self, count: u64) {
        self.frames_discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// The capture device went unavailable
    pub fn record_device_suspension(&self) {
        self.device_suspensions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_backlog_dropped: self.frames_backlog_dropped.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            upload_retries: self.upload_retries.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            device_suspensions: self.device_suspensions.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Copy of the pipeline counters at one moment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Frames taken from the source
    pub frames_captured: u64,
    /// Frames encoded successfully
    pub frames_encoded: u64,
    /// Lost to the queue drop policy
    pub frames_dropped: u64,
    /// Lost because the encoder fell behind capture
    pub frames_backlog_dropped: u64,
    /// Frames the encoder rejected
    pub encode_failures: u64,
    /// Frames delivered
    pub uploads_succeeded: u64,
    /// Frames whose upload failed for good
    pub uploads_failed: u64,
    /// Retries across all uploads
    pub upload_retries: u64,
    /// Still queued when a discarding shutdown ran
    pub frames_discarded: u64,
    /// Times the capture device went unavailable
    pub device_suspensions: u64,
    /// Time since the metrics were created
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Uploads that reached a terminal outcome
    pub fn uploads_finished(&self) -> u64 {
        self.uploads_succeeded + self.uploads_failed
    }

    /// Fraction of finished uploads that succeeded (1.0 when none finished)
    pub fn success_rate(&self) -> f64 {
        let finished = self.uploads_finished();
        if finished == 0 {
            1.0
        } else {
            self.uploads_succeeded as f64 / finished as f64
        }
    }

    /// Effective upload rate over the pipeline's lifetime
    pub fn upload_fps(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs <= f64::EPSILON {
            0.0
        } else {
            self.uploads_succeeded as f64 / secs
        }
    }
}
