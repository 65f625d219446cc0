//! Tests for configuration validation

use prometheus_delivery::config::{AckQueueConfig, BackoffConfig, BatchConfig, DeliveryConfig};
use std::time::Duration;

#[test]
fn test_ack_queue_config_defaults() {
    let cfg = AckQueueConfig::default();
    assert!(!cfg.auto_requeue);
    assert_eq!(cfg.ack_timeout(), Duration::from_secs(60));
    assert_eq!(cfg.queue_limit, None);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_ack_queue_config_invalid_timeout() {
    let invalid = AckQueueConfig {
        ack_timeout_ms: 0,
        ..AckQueueConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_ack_queue_config_invalid_requeue_period() {
    let invalid = AckQueueConfig::new().with_auto_requeue(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_ack_queue_config_invalid_limit() {
    assert!(AckQueueConfig::new().with_queue_limit(0).validate().is_err());
}

#[test]
fn test_backoff_config_ordering() {
    let invalid = BackoffConfig {
        minimum_backoff_ms: 10_000,
        maximum_backoff_ms: 1_000,
        ..BackoffConfig::default()
    };
    assert!(invalid.validate().is_err());

    let invalid = BackoffConfig {
        failures_before_dropping_batch: 5,
        failures_before_dropping_queue: 3,
        ..BackoffConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_batch_config_validation() {
    assert!(BatchConfig::new(10, Duration::from_millis(100)).validate().is_ok());
    assert!(BatchConfig::new(0, Duration::from_millis(100)).validate().is_err());
    assert!(BatchConfig::new(10, Duration::ZERO).validate().is_err());
    assert!(BatchConfig::new(10, Duration::from_millis(100))
        .with_queue_limit(0)
        .validate()
        .is_err());
}

#[test]
fn test_delivery_config_from_json_partial() {
    let json = r#"{
        "queue": { "auto_requeue": true, "ack_timeout_ms": 3000, "requeue_period_ms": 2000 },
        "batching": { "batch_size_limit": 50, "backoff": { "minimum_backoff_ms": 100 } }
    }"#;
    let cfg = DeliveryConfig::from_json_str(json).unwrap();
    assert!(cfg.queue.auto_requeue);
    assert_eq!(cfg.queue.ack_timeout(), Duration::from_secs(3));
    assert_eq!(cfg.batching.batch_size_limit, 50);
    assert_eq!(cfg.batching.period_ms, BatchConfig::default().period_ms);
    assert_eq!(cfg.batching.backoff.minimum_backoff_ms, 100);
    assert_eq!(cfg.batching.backoff.failures_before_dropping_batch, 8);
}

#[test]
fn test_delivery_config_from_json_rejects_invalid() {
    assert!(DeliveryConfig::from_json_str(r#"{ "queue": { "ack_timeout_ms": 0 } }"#).is_err());
    assert!(DeliveryConfig::from_json_str("not json").is_err());
}
