//! Integration tests for the ack-tracked queue.
//!
//! This test validates:
//! 1. Dequeued events are hidden until acked or expired
//! 2. Acked events never come back
//! 3. Expired events are redelivered with the same payload and id
//! 4. The background requeue loop redelivers without manual calls
//! 5. Concurrent consumers see each event exactly once
//! 6. Acks that arrive after a requeue are ignored
//! 7. read_all streams events until cancelled

use prometheus_delivery::config::AckQueueConfig;
use futures::StreamExt;
use prometheus_delivery::core::{AckQueue, EventProperties, READ_ALL_POLL_INTERVAL};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TestEvent {
    message: String,
}

fn test_event() -> TestEvent {
    TestEvent {
        message: "Test Message".to_string(),
    }
}

fn manual_queue(ack_timeout: Duration) -> AckQueue {
    AckQueue::new(AckQueueConfig::new().with_ack_timeout(ack_timeout)).unwrap()
}

#[test]
fn test_dequeue_hides_event_until_deadline() {
    let queue = manual_queue(Duration::from_secs(60));
    queue.enqueue(test_event(), None).unwrap();

    let first = queue.dequeue::<TestEvent>().expect("event available");
    assert_eq!(first.data().message, "Test Message");
    assert!(queue.dequeue::<TestEvent>().is_none());

    let stats = queue.stats();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.in_flight, 1);
}

#[test]
fn test_acked_event_never_reappears() {
    let queue = manual_queue(Duration::from_millis(50));
    queue.enqueue(test_event(), None).unwrap();

    let envelope = queue.dequeue::<TestEvent>().unwrap();
    assert!(queue.ack(&envelope.event_id()));

    thread::sleep(Duration::from_millis(120));
    assert_eq!(queue.requeue_unacked(), 0);
    assert!(queue.dequeue::<TestEvent>().is_none());

    // Second ack is a no-op.
    assert!(!queue.ack(&envelope.event_id()));
    assert_eq!(queue.stats().acked, 1);
}

#[test]
fn test_unacked_event_redelivered_after_timeout() {
    let queue = manual_queue(Duration::from_millis(50));
    let props = EventProperties::new()
        .with_trace_id("trace-1")
        .with_header("tenant", "acme");
    let id = queue.enqueue(test_event(), Some(props)).unwrap().unwrap();

    let first = queue.dequeue::<TestEvent>().unwrap();
    assert_eq!(first.event_id(), id);

    // Not yet expired.
    assert_eq!(queue.requeue_unacked(), 0);

    thread::sleep(Duration::from_millis(120));
    assert_eq!(queue.requeue_unacked(), 1);

    let again = queue.dequeue::<TestEvent>().expect("redelivered");
    assert_eq!(again.event_id(), id);
    assert_eq!(again.data(), &test_event());
    assert_eq!(again.properties().trace_id.as_deref(), Some("trace-1"));
    assert_eq!(
        again.properties().headers.get("tenant"),
        Some(&serde_json::json!("acme"))
    );
    assert_eq!(queue.stats().requeued, 1);
}

#[test]
fn test_late_ack_after_requeue_is_ignored() {
    let queue = manual_queue(Duration::from_millis(30));
    let id = queue.enqueue(test_event(), None).unwrap().unwrap();
    let _first = queue.dequeue::<TestEvent>().unwrap();

    thread::sleep(Duration::from_millis(80));
    assert_eq!(queue.requeue_unacked(), 1);

    // The consumer finishes too late: its ack refers to a record that no longer exists.
    assert!(!queue.ack(&id));
    assert_eq!(queue.stats().acked, 0);
    assert_eq!(queue.stats().available, 1);

    let again = queue.dequeue::<TestEvent>().expect("still deliverable");
    assert_eq!(again.event_id(), id);
    assert!(queue.ack(&id));
    assert_eq!(queue.stats().acked, 1);
}

#[test]
fn test_requeued_events_append_to_tail() {
    let queue = manual_queue(Duration::from_millis(30));
    queue.enqueue(1u32, None).unwrap();
    let _in_flight = queue.dequeue::<u32>().unwrap();
    queue.enqueue(2u32, None).unwrap();

    thread::sleep(Duration::from_millis(80));
    queue.requeue_unacked();

    assert_eq!(*queue.dequeue::<u32>().unwrap().data(), 2);
    assert_eq!(*queue.dequeue::<u32>().unwrap().data(), 1);
}

#[test]
fn test_auto_requeue_loop_redelivers() {
    let queue = AckQueue::new(
        AckQueueConfig::new()
            .with_ack_timeout(Duration::from_secs(3))
            .with_auto_requeue(Duration::from_secs(2)),
    )
    .unwrap();

    queue.enqueue(test_event(), None).unwrap();
    let first = queue.dequeue::<TestEvent>().unwrap();

    thread::sleep(Duration::from_secs(5));

    let again = queue
        .dequeue::<TestEvent>()
        .expect("background loop should have requeued the event");
    assert_eq!(again.event_id(), first.event_id());
    assert_eq!(again.data().message, "Test Message");
}

#[test]
fn test_concurrent_consumers_each_event_once() {
    let queue = Arc::new(manual_queue(Duration::from_secs(60)));
    for i in 0..1_000u32 {
        queue.enqueue(i, None).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(envelope) = queue.dequeue::<u32>() {
                    seen.push(*envelope.data());
                    assert!(queue.ack(&envelope.event_id()));
                }
                seen
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        for value in handle.join().unwrap() {
            assert!(all.insert(value), "value {value} delivered twice");
        }
    }
    assert_eq!(all.len(), 1_000);
    assert_eq!(queue.stats().in_flight, 0);
}

#[tokio::test]
async fn test_async_wrappers() {
    let queue = manual_queue(Duration::from_secs(60));
    let id = queue.enqueue_async(test_event(), None).await.unwrap().unwrap();

    let envelope = queue.dequeue_async::<TestEvent>().await.unwrap();
    assert_eq!(envelope.event_id(), id);
    assert!(queue.ack_async(&id).await);
}

#[tokio::test]
async fn test_read_all_streams_until_cancelled() {
    let queue = manual_queue(Duration::from_secs(60));
    let mut ids = Vec::new();
    for i in 0..3u32 {
        ids.push(queue.enqueue(i, None).unwrap().unwrap());
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let mut events = Box::pin(queue.read_all(async move {
        let _ = cancel_rx.await;
    }));

    for expected in &ids {
        let envelope = events.next().await.expect("queued event");
        assert_eq!(envelope.event_id(), *expected);
    }
    let stats = queue.stats();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.in_flight, 3);

    // An event enqueued while the stream waits is picked up on the next poll.
    let late = queue.enqueue(3u32, None).unwrap().unwrap();
    let envelope = tokio::time::timeout(READ_ALL_POLL_INTERVAL * 3, events.next())
        .await
        .expect("picked up within a few polls")
        .expect("stream still open");
    assert_eq!(envelope.event_id(), late);
    assert_eq!(*envelope.downcast::<u32>().unwrap().data(), 3);
    assert!(queue.ack(&late));

    cancel_tx.send(()).unwrap();
    assert!(events.next().await.is_none());
    assert_eq!(queue.stats().in_flight, 3);
}

#[tokio::test]
async fn test_read_all_cancel_wakes_idle_stream() {
    let queue = manual_queue(Duration::from_secs(60));
    let mut events = Box::pin(queue.read_all(tokio::time::sleep(Duration::from_millis(50))));

    let ended = tokio::time::timeout(Duration::from_secs(2), events.next())
        .await
        .expect("cancellation ends the stream");
    assert!(ended.is_none());
}
