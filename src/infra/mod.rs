//! Infrastructure adapters.

pub mod registry;

pub use registry::InMemoryHandlerRegistry;
