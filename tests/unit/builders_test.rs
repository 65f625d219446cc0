//! Tests for configuration-driven builders

use prometheus_delivery::builders::{build_ack_queue, build_batcher, build_event_bus};
use prometheus_delivery::config::DeliveryConfig;
use prometheus_delivery::core::{DeliveryError, FnSink};
use prometheus_delivery::infra::InMemoryHandlerRegistry;

#[test]
fn test_build_ack_queue_from_defaults() {
    let queue = build_ack_queue(&DeliveryConfig::default()).unwrap();
    assert!(!queue.config().auto_requeue);
    assert_eq!(queue.stats().available, 0);
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut cfg = DeliveryConfig::default();
    cfg.queue.ack_timeout_ms = 0;
    assert!(matches!(build_ack_queue(&cfg), Err(DeliveryError::InvalidConfig(_))));
    assert!(matches!(
        build_event_bus(&cfg, InMemoryHandlerRegistry::new()),
        Err(DeliveryError::InvalidConfig(_))
    ));
}

#[test]
fn test_build_batcher_from_json() {
    let cfg = DeliveryConfig::from_json_str(
        r#"{ "batching": { "batch_size_limit": 5, "period_ms": 50 } }"#,
    )
    .unwrap();
    let batcher = build_batcher(&cfg, FnSink(|_: &[String]| Ok(()))).unwrap();
    assert!(batcher.emit("hello".to_string()).unwrap());
    batcher.dispose();
    assert_eq!(batcher.stats().items_flushed, 1);
}
