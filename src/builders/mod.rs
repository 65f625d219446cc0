//! Builders wiring configuration into runtime components.

pub mod delivery_builder;

pub use delivery_builder::{build_ack_queue, build_batcher, build_event_bus};
