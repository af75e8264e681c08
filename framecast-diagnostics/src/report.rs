//! Serializable pipeline health reports

use chrono::{DateTime, Utc};
use framecast_core::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// Coarse pipeline condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineHealth {
    /// Capturing and uploading normally
    Healthy,
    /// Running, but under half of all finished uploads have succeeded
    Degraded,
    /// Waiting for the capture device
    Suspended,
    /// Not running
    Stopped,
}

/// Point-in-time view of a pipeline, suitable for logging or export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// When the report was taken
    pub generated_at: DateTime<Utc>,
    /// False once shutdown has begun
    pub running: bool,
    /// Capture device readiness
    pub device_ready: bool,
    /// Frames waiting for upload
    pub queue_depth: usize,
    /// Upload queue capacity
    pub queue_capacity: usize,
    /// Counters at report time
    pub metrics: MetricsSnapshot,
}

impl PipelineReport {
    /// Classify the pipeline from this report.
    ///
    /// The success rate is taken over the pipeline's lifetime, not a window.
    pub fn health(&self) -> PipelineHealth {
        if !self.running {
            PipelineHealth::Stopped
        } else if !self.device_ready {
            PipelineHealth::Suspended
        } else if self.metrics.success_rate() < 0.5 {
            PipelineHealth::Degraded
        } else {
            PipelineHealth::Healthy
        }
    }

    /// Share of captured frames lost to the queue or the encoder backlog
    pub fn drop_ratio(&self) -> f64 {
        let captured = self.metrics.frames_captured;
        if captured == 0 {
            return 0.0;
        }
        let dropped = self.metrics.frames_dropped + self.metrics.frames_backlog_dropped;
        dropped as f64 / captured as f64
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(running: bool, device_ready: bool, metrics: MetricsSnapshot) -> PipelineReport {
        PipelineReport {
            generated_at: Utc::now(),
            running,
            device_ready,
            queue_depth: 2,
            queue_capacity: 8,
            metrics,
        }
    }

    #[test]
    fn test_health_classification() {
        assert_eq!(
            report(false, true, MetricsSnapshot::default()).health(),
            PipelineHealth::Stopped
        );
        assert_eq!(
            report(true, false, MetricsSnapshot::default()).health(),
            PipelineHealth::Suspended
        );
        assert_eq!(
            report(true, true, MetricsSnapshot::default()).health(),
            PipelineHealth::Healthy
        );

        let failing = MetricsSnapshot {
            uploads_succeeded: 1,
            uploads_failed: 3,
            ..MetricsSnapshot::default()
        };
        assert_eq!(report(true, true, failing).health(), PipelineHealth::Degraded);
    }

    #[test]
    fn test_degraded_uses_lifetime_success_rate() {
        let mostly_ok = MetricsSnapshot {
            uploads_succeeded: 60,
            uploads_failed: 40,
            ..MetricsSnapshot::default()
        };
        assert_eq!(report(true, true, mostly_ok).health(), PipelineHealth::Healthy);

        let mostly_failed = MetricsSnapshot {
            uploads_succeeded: 49,
            uploads_failed: 51,
            ..MetricsSnapshot::default()
        };
        assert_eq!(
            report(true, true, mostly_failed).health(),
            PipelineHealth::Degraded
        );
    }

    #[test]
    fn test_drop_ratio() {
        let metrics = MetricsSnapshot {
            frames_captured: 20,
            frames_dropped: 4,
            frames_backlog_dropped: 1,
            ..MetricsSnapshot::default()
        };
        let ratio = report(true, true, metrics).drop_ratio();
        assert!((ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_export() {
        let json = report(true, true, MetricsSnapshot::default())
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["queue_capacity"], 8);
        assert_eq!(value["metrics"]["frames_captured"], 0);
    }
}
