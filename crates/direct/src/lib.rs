//! Synchronous generation backend.
//!
//! One `POST /generate` per job; the response body is the artifact and the
//! `x-job-id` header carries the backend's job id. Output is normalized to
//! PNG before it is handed back.

pub mod api;
pub mod backend;
pub mod models;
pub mod normalize;

pub use backend::{DirectBackend, DirectBackendConfig};
