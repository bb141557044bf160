//! Command buffer tests.
//!
//! Covers FIFO ordering across producer threads, non-overlapping execution,
//! failure isolation and shutdown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgelink_core::{CommandBuffer, CommandBufferError, Error};
use parking_lot::Mutex;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_commands_run_in_submission_order() {
    let buffer = CommandBuffer::new();
    let executed = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let executed = executed.clone();
        assert_ok!(buffer.push(async move {
            if i % 7 == 0 {
                tokio::task::yield_now().await;
            }
            executed.lock().push(i);
            Ok(())
        }));
    }

    buffer.shutdown().await;

    let executed = executed.lock().clone();
    assert_eq!(executed, (0..100).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_commands_never_overlap() {
    let buffer = CommandBuffer::new();
    let running = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let running = running.clone();
        let overlaps = overlaps.clone();
        buffer
            .push(async move {
                if running.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.store(false, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    buffer.shutdown().await;
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(buffer.stats().processed, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multiple_producer_threads_keep_real_time_order() {
    let buffer = CommandBuffer::new();
    let executed = Arc::new(Mutex::new(Vec::new()));
    // Taking a ticket and pushing under one lock fixes the real-time order.
    let ticket = Arc::new(Mutex::new(0usize));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let buffer = buffer.clone();
            let executed = executed.clone();
            let ticket = ticket.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let mut next = ticket.lock();
                    let seq = *next;
                    *next += 1;
                    let executed = executed.clone();
                    buffer
                        .push_fn(move || {
                            executed.lock().push(seq);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    buffer.shutdown().await;

    let executed = executed.lock().clone();
    assert_eq!(executed.len(), 200);
    assert_eq!(executed, (0..200).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_panicking_command_does_not_stop_worker() {
    let buffer = CommandBuffer::new();
    let after = Arc::new(AtomicBool::new(false));

    buffer
        .push_fn(|| -> edgelink_core::Result<()> { panic!("listener bug") })
        .unwrap();
    buffer
        .push_fn(|| Err(Error::Decode("garbage".to_string())))
        .unwrap();

    let flag = after.clone();
    buffer
        .push_fn(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    buffer.shutdown().await;

    assert!(after.load(Ordering::SeqCst));
    let stats = buffer.stats();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.failed, 2);
}

#[tokio::test]
async fn test_shutdown_drains_queue_and_rejects_new_commands() {
    let buffer = CommandBuffer::new();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..100 {
        let counter = counter.clone();
        buffer
            .push_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    buffer.shutdown().await;
    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert!(buffer.is_closed());

    let result = buffer.push_fn(|| Ok(()));
    assert_eq!(assert_err!(result), CommandBufferError::Closed);
    assert_eq!(buffer.stats().pending, 0);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let buffer = CommandBuffer::new();
    let clone = buffer.clone();

    buffer.shutdown().await;
    clone.shutdown().await;

    assert!(clone.is_closed());
    assert!(clone.push_fn(|| Ok(())).is_err());
}

#[tokio::test]
async fn test_command_can_enqueue_follow_up() {
    let buffer = CommandBuffer::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let inner_buffer = buffer.clone();
    let inner_order = order.clone();
    buffer
        .push_fn(move || {
            inner_order.lock().push("first");
            let follow_up_order = inner_order.clone();
            inner_buffer.push_fn(move || {
                follow_up_order.lock().push("follow-up");
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let second = order.clone();
    buffer
        .push_fn(move || {
            second.lock().push("second");
            Ok(())
        })
        .unwrap();

    // Let the follow-up land before the stop marker.
    tokio::time::sleep(Duration::from_millis(20)).await;
    buffer.shutdown().await;

    assert_eq!(*order.lock(), vec!["first", "second", "follow-up"]);
}
