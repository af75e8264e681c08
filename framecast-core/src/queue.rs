//! Bounded upload queue with an explicit drop policy
//!
//! The queue is the only structure shared between the encode stage and the
//! upload workers. `push` never blocks: when the queue is full the configured
//! [`DropPolicy`] decides which frame is discarded. Retained frames keep FIFO
//! order, so sequence numbers leave the queue strictly increasing.

use crate::frame::EncodedFrame;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which frame to discard when the queue is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropPolicy {
    /// Evict the frame at the head of the queue and keep the new one
    #[default]
    DropOldest,
    /// Reject the incoming frame
    DropNewest,
}

/// What happened to a pushed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored without evicting anything
    Enqueued,
    /// Stored after evicting the frame with this sequence number
    EvictedOldest(u64),
    /// Not stored; the incoming frame with this sequence number was dropped
    RejectedNewest(u64),
    /// Not stored; the queue is closed
    Closed(u64),
}

impl PushOutcome {
    /// Sequence number of the frame lost by this push, if any
    pub fn dropped_sequence(&self) -> Option<u64> {
        match self {
            PushOutcome::Enqueued => None,
            PushOutcome::EvictedOldest(seq)
            | PushOutcome::RejectedNewest(seq)
            | PushOutcome::Closed(seq) => Some(*seq),
        }
    }
}

/// Bounded FIFO of encoded frames awaiting upload
#[derive(Debug)]
pub struct UploadQueue {
    slots: Mutex<VecDeque<EncodedFrame>>,
    capacity: usize,
    policy: DropPolicy,
    dropped: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl UploadQueue {
    /// Create a queue holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Insert a frame, applying the drop policy when full
    pub fn push(&self, frame: EncodedFrame) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Closed(frame.sequence);
        }

        let outcome = {
            let mut slots = self.slots.lock();
            if slots.len() < self.capacity {
                slots.push_back(frame);
                PushOutcome::Enqueued
            } else {
                match self.policy {
                    DropPolicy::DropOldest => {
                        let evicted = slots.pop_front().map(|f| f.sequence).unwrap_or_default();
                        slots.push_back(frame);
                        PushOutcome::EvictedOldest(evicted)
                    }
                    DropPolicy::DropNewest => PushOutcome::RejectedNewest(frame.sequence),
                }
            }
        };

        match outcome {
            PushOutcome::Enqueued => self.notify.notify_one(),
            PushOutcome::EvictedOldest(seq) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = seq, "Queue full, evicted oldest frame");
                self.notify.notify_one();
            }
            PushOutcome::RejectedNewest(seq) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = seq, "Queue full, rejected newest frame");
            }
            PushOutcome::Closed(_) => {}
        }

        outcome
    }

    /// Non-blocking poll for the oldest retained frame
    pub fn pop(&self) -> Option<EncodedFrame> {
        self.slots.lock().pop_front()
    }

    /// Wait for a frame.
    ///
    /// Returns `None` once `cancel` fires, or once the queue is closed and
    /// empty. A closed queue still hands out the frames it holds, which is
    /// what lets workers drain it on shutdown.
    pub async fn pop_wait(&self, cancel: &CancellationToken) -> Option<EncodedFrame> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return None;
            }
            if let Some(frame) = self.pop() {
                return Some(frame);
            }
            if self.is_closed() {
                return None;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Stop accepting frames and wake every waiter
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Remove every queued frame, returning how many were discarded
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let discarded = slots.len();
        slots.clear();
        discarded
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// True when no frames are queued
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Maximum frames held at once
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Policy applied when a push finds the queue full
    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    /// Frames lost to the drop policy so far
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Sequence numbers currently queued, head first
    pub fn sequences(&self) -> Vec<u64> {
        self.slots.lock().iter().map(|f| f.sequence).collect()
    }
}
