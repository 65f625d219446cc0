//! Benchmarks for the delivery primitives.
//!
//! Benchmarks cover:
//! - BoundedQueue enqueue/dequeue, unbounded and at capacity
//! - AckQueue enqueue/dequeue/ack cycles and expiry sweeps
//! - PeriodicBatcher emit throughput
//! - EventBus publish fan-out

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use prometheus_delivery::config::{AckQueueConfig, BatchConfig};
use prometheus_delivery::core::{AckQueue, BoundedQueue, FnSink, PeriodicBatcher};
use prometheus_delivery::event::EventBus;
use prometheus_delivery::infra::InMemoryHandlerRegistry;

use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
struct BenchEvent {
    id: u64,
    data: String,
}

fn build_event(id: u64) -> BenchEvent {
    BenchEvent {
        id,
        data: format!("payload-{id}"),
    }
}

// ============================================================================
// Bounded Queue Benchmarks
// ============================================================================

fn bench_bounded_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_enqueue_dequeue");

    for size in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let q = BoundedQueue::new();
                for i in 0..size {
                    q.try_enqueue(build_event(i));
                }
                while let Some(event) = q.try_dequeue() {
                    black_box(event);
                }
            });
        });
    }
    group.finish();
}

fn bench_bounded_overflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_overflow");

    for limit in [10usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            let q = BoundedQueue::with_limit(limit).unwrap();
            for i in 0..limit as u64 {
                q.try_enqueue(i);
            }
            b.iter(|| black_box(q.try_enqueue(0)));
        });
    }
    group.finish();
}

// ============================================================================
// Ack Queue Benchmarks
// ============================================================================

fn bench_ack_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("ack_enqueue_dequeue_ack");

    for size in [100u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let queue = AckQueue::new(AckQueueConfig::new()).unwrap();
            b.iter(|| {
                for i in 0..size {
                    queue.enqueue(build_event(i), None).unwrap();
                }
                while let Some(envelope) = queue.dequeue::<BenchEvent>() {
                    black_box(envelope.data().id);
                    queue.ack(&envelope.event_id());
                }
            });
        });
    }
    group.finish();
}

fn bench_ack_requeue_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("ack_requeue_sweep");

    for size in [100u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let queue = AckQueue::new(
                AckQueueConfig::new().with_ack_timeout(Duration::from_millis(1)),
            )
            .unwrap();
            for i in 0..size {
                queue.enqueue(build_event(i), None).unwrap();
            }
            b.iter(|| {
                while let Some(envelope) = queue.dequeue::<BenchEvent>() {
                    black_box(envelope.data().data.len());
                }
                std::thread::sleep(Duration::from_millis(2));
                black_box(queue.requeue_unacked());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Batching and Bus Benchmarks
// ============================================================================

fn bench_batcher_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("batcher_emit");
    group.throughput(Throughput::Elements(1));

    let batcher = PeriodicBatcher::new(
        BatchConfig::new(1_000, Duration::from_millis(50)),
        FnSink(|batch: &[BenchEvent]| {
            black_box(batch.len());
            Ok(())
        }),
    )
    .unwrap();
    let mut next = 0u64;
    group.bench_function("emit", |b| {
        b.iter(|| {
            next += 1;
            black_box(batcher.emit(build_event(next)).unwrap())
        });
    });
    group.finish();
    batcher.dispose();
}

fn bench_bus_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_publish");

    for handlers in [1usize, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(handlers),
            &handlers,
            |b, &handlers| {
                let registry = InMemoryHandlerRegistry::new();
                for _ in 0..handlers {
                    registry.subscribe_fn(|event: &BenchEvent, _| {
                        black_box(event.id);
                        Ok(())
                    });
                }
                let queue = Arc::new(AckQueue::new(AckQueueConfig::new()).unwrap());
                let bus = Arc::new(EventBus::new(registry, queue));
                b.to_async(Runtime::new().unwrap()).iter(|| {
                    let bus = Arc::clone(&bus);
                    async move { black_box(bus.publish(build_event(1), None).await) }
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    queue_benches,
    bench_bounded_enqueue_dequeue,
    bench_bounded_overflow,
    bench_ack_cycle,
    bench_ack_requeue_sweep
);

criterion_group!(delivery_benches, bench_batcher_emit, bench_bus_publish);

criterion_main!(queue_benches, delivery_benches);
