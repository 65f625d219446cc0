//! Tests for error types

use prometheus_delivery::core::DeliveryError;

#[test]
fn test_invalid_argument_error() {
    let err = DeliveryError::InvalidArgument("limit must be positive".to_string());
    assert_eq!(format!("{}", err), "invalid argument: limit must be positive");
}

#[test]
fn test_invalid_config_error() {
    let err = DeliveryError::InvalidConfig("period_ms must be positive".to_string());
    assert_eq!(format!("{}", err), "invalid configuration: period_ms must be positive");
}

#[test]
fn test_disposed_error() {
    let err = DeliveryError::Disposed("AckQueue");
    assert_eq!(format!("{}", err), "object disposed: AckQueue");
}

#[test]
fn test_internal_error() {
    let err = DeliveryError::Internal("thread spawn failed".to_string());
    assert_eq!(format!("{}", err), "internal error: thread spawn failed");
}

#[test]
fn test_converts_into_anyhow() {
    let err: anyhow::Error = DeliveryError::Disposed("PeriodicBatcher").into();
    assert!(err.downcast_ref::<DeliveryError>().is_some());
}
