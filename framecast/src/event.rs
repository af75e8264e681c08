//! Pipeline events
//!
//! The supervisor broadcasts a [`PipelineEvent`] for every lifecycle change,
//! dropped frame, encode failure and finished upload. Subscribers that fall
//! behind lose the oldest events rather than slowing the pipeline down.

use framecast_core::MetricsSnapshot;
use framecast_upload::UploadResult;
use tokio::sync::broadcast;
use tracing::debug;

/// Why a frame never reached the upload queue, or left it unsent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Evicted or rejected by the queue drop policy
    QueueFull,
    /// Encoder was still busy with earlier frames
    EncoderBacklog,
}

/// Something that happened inside a running pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Capture, encode and upload tasks are running
    Started {
        /// Upload worker count
        workers: usize,
        /// Capture ticks per second
        frame_rate: f64,
    },
    /// The capture device stopped delivering; capture is paused
    DeviceSuspended {
        /// Device name
        device: String,
        /// Reason reported by the source
        reason: String,
    },
    /// The capture device is delivering again
    DeviceResumed {
        /// Device name
        device: String,
    },
    /// A frame was dropped before upload
    FrameDropped {
        /// Sequence of the dropped frame
        sequence: u64,
        /// Which stage dropped it
        reason: DropReason,
    },
    /// A frame could not be encoded and was discarded
    EncodeFailed {
        /// Sequence of the failed frame
        sequence: u64,
        /// Encoder error message
        reason: String,
    },
    /// A frame reached its final upload outcome
    UploadCompleted(UploadResult),
    /// The pipeline has shut down
    Stopped {
        /// Final metrics
        snapshot: MetricsSnapshot,
    },
}

impl PipelineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => "started",
            PipelineEvent::DeviceSuspended { .. } => "device_suspended",
            PipelineEvent::DeviceResumed { .. } => "device_resumed",
            PipelineEvent::FrameDropped { .. } => "frame_dropped",
            PipelineEvent::EncodeFailed { .. } => "encode_failed",
            PipelineEvent::UploadCompleted(_) => "upload_completed",
            PipelineEvent::Stopped { .. } => "stopped",
        }
    }

    /// Check if this is a device-related event
    pub fn is_device_event(&self) -> bool {
        matches!(
            self,
            PipelineEvent::DeviceSuspended { .. } | PipelineEvent::DeviceResumed { .. }
        )
    }

    /// Check if this event reports a lost or failed frame
    pub fn is_failure(&self) -> bool {
        match self {
            PipelineEvent::FrameDropped { .. } | PipelineEvent::EncodeFailed { .. } => true,
            PipelineEvent::UploadCompleted(result) => !result.success,
            _ => false,
        }
    }
}

/// Receiving end of the pipeline event broadcast
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<PipelineEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<PipelineEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, skipping any this subscriber lagged past.
    ///
    /// Returns `None` once the pipeline is gone and every event was read.
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to get the next event without waiting
    pub fn try_next(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failed_upload() -> UploadResult {
        UploadResult {
            sequence: 4,
            success: false,
            http_status: Some(404),
            error: None,
            attempts: 1,
            worker_id: 0,
            reply: None,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_event_classification() {
        let suspended = PipelineEvent::DeviceSuspended {
            device: "camera-0".into(),
            reason: "unplugged".into(),
        };
        assert_eq!(suspended.event_type(), "device_suspended");
        assert!(suspended.is_device_event());
        assert!(!suspended.is_failure());

        let dropped = PipelineEvent::FrameDropped {
            sequence: 3,
            reason: DropReason::QueueFull,
        };
        assert!(dropped.is_failure());
        assert!(PipelineEvent::UploadCompleted(failed_upload()).is_failure());
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (tx, rx) = broadcast::channel(4);
        let mut stream = EventStream::new(rx);

        tx.send(PipelineEvent::DeviceResumed {
            device: "synthetic".into(),
        })
        .unwrap();
        drop(tx);

        assert_eq!(stream.next().await.unwrap().event_type(), "device_resumed");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let (tx, rx) = broadcast::channel(2);
        let mut stream = EventStream::new(rx);

        for sequence in 1..=5 {
            tx.send(PipelineEvent::FrameDropped {
                sequence,
                reason: DropReason::EncoderBacklog,
            })
            .unwrap();
        }

        match stream.next().await {
            Some(PipelineEvent::FrameDropped { sequence, .. }) => assert_eq!(sequence, 4),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(stream.try_next().is_some());
        assert!(stream.try_next().is_none());
    }
}
