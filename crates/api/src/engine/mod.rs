//! Job execution engine.
//!
//! [`GenerationRunner`] owns the orchestration boundary: it picks a backend
//! for each job, mirrors backend events into the job record, stores the
//! artifact and announces it to subscribers.

pub mod metadata;
pub mod runner;

pub use runner::{GenerationRunner, RunError};
