//! Runtime adapters: worker threads and the runtimes that drive async sinks.

pub mod worker;

pub use worker::{run_on_worker, worker_runtime};
