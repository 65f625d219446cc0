//! Event bus and handler abstractions.

pub mod bus;
pub mod handler;

pub use bus::{DispatchReport, EventBus};
pub use handler::{EventHandler, FnEventHandler, HandlerResolver};
