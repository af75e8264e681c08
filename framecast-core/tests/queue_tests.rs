//! Integration tests for the bounded upload queue
//!
//! These tests exercise the queue's capacity and ordering guarantees under
//! randomized push sequences and concurrent consumers.

use bytes::Bytes;
use chrono::Utc;
use framecast_core::*;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn encoded(sequence: u64) -> EncodedFrame {
    EncodedFrame {
        sequence,
        captured_at: Utc::now(),
        encoded_at: Utc::now(),
        resolution: Resolution::QVGA,
        format: ImageFormat::Jpeg,
        payload: Bytes::from_static(b"\xff\xd8\xff"),
    }
}

// ============================================================================
// CAPACITY AND ORDERING
// ============================================================================

#[test]
fn test_capacity_never_exceeded_under_random_traffic() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    for policy in [DropPolicy::DropOldest, DropPolicy::DropNewest] {
        for capacity in 1..=6 {
            let queue = UploadQueue::new(capacity, policy);
            let mut next = 1u64;
            let mut last_popped = 0u64;

            for _ in 0..500 {
                if rng.gen_bool(0.7) {
                    queue.push(encoded(next));
                    next += 1;
                } else if let Some(frame) = queue.pop() {
                    assert!(frame.sequence > last_popped);
                    last_popped = frame.sequence;
                }
                assert!(queue.len() <= capacity);
            }
        }
    }
}

#[test]
fn test_drop_oldest_retains_most_recent_n() {
    let queue = UploadQueue::new(5, DropPolicy::DropOldest);
    for seq in 1..=10 {
        queue.push(encoded(seq));
    }

    let remaining: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|f| f.sequence)).collect();
    assert_eq!(remaining, vec![6, 7, 8, 9, 10]);
    assert_eq!(queue.dropped_count(), 5);
}

#[test]
fn test_drop_newest_counts_every_rejection() {
    let queue = UploadQueue::new(2, DropPolicy::DropNewest);
    let rejected = (1..=6)
        .map(|seq| queue.push(encoded(seq)))
        .filter(|outcome| matches!(outcome, PushOutcome::RejectedNewest(_)))
        .count();

    assert_eq!(rejected, 4);
    assert_eq!(queue.dropped_count(), 4);
    assert_eq!(queue.sequences(), vec![1, 2]);
}

// ============================================================================
// CONCURRENT CONSUMERS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_consumer_sees_increasing_sequences() {
    let queue = Arc::new(UploadQueue::new(64, DropPolicy::DropOldest));
    let cancel = CancellationToken::new();

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        let cancel = cancel.clone();
        consumers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(frame) = queue.pop_wait(&cancel).await {
                seen.push(frame.sequence);
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    for seq in 1..=200 {
        queue.push(encoded(seq));
        if seq % 16 == 0 {
            tokio::task::yield_now().await;
        }
    }
    queue.close();

    let mut total = 0;
    for consumer in consumers {
        let seen = consumer.await.unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        total += seen.len() as u64;
    }

    assert_eq!(total + queue.dropped_count(), 200);
}

#[tokio::test]
async fn test_close_wakes_idle_consumers() {
    let queue = Arc::new(UploadQueue::new(4, DropPolicy::DropOldest));
    let cancel = CancellationToken::new();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop_wait(&cancel).await })
        })
        .collect();

    tokio::task::yield_now().await;
    queue.close();

    for waiter in waiters {
        assert!(waiter.await.unwrap().is_none());
    }
}
