//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod generation_job_repo;

pub use generation_job_repo::GenerationJobRepo;
