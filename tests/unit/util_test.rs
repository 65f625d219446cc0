//! Tests for utility functions

use prometheus_delivery::core::{EventId, EventProperties};
use prometheus_delivery::util::{init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 1_600_000_000_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

#[test]
fn test_event_id_parse_round_trip() {
    let id = EventId::new();
    let parsed: EventId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<EventId>().is_err());
}

#[test]
fn test_event_properties_serialize() {
    let props = EventProperties::new()
        .with_trace_id("abc")
        .with_header("attempt", 2);
    let json = serde_json::to_value(&props).unwrap();
    assert_eq!(json["trace_id"], "abc");
    assert_eq!(json["headers"]["attempt"], 2);

    let back: EventProperties = serde_json::from_value(json).unwrap();
    assert_eq!(back, props);
}
