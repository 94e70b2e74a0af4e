//! Shared worker runtime primitives.
//!
//! This crate centralizes the blocking work-queue used by the config
//! engine's phased pipelines: a bounded FIFO of fallible tasks executed
//! by a fixed pool of named OS threads, with join barriers and failure
//! collection.

mod queue;

pub use queue::{QueueStats, TaskError, TaskPanicked, WorkQueue};
