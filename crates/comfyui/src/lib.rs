//! ComfyUI generation backend.
//!
//! Submits templated workflows over the ComfyUI REST API, follows progress
//! over its WebSocket, and polls the queue and history endpoints until the
//! prompt finishes or times out.

pub mod api;
pub mod backend;
pub mod client;
pub mod history;
pub mod messages;
pub mod progress;
pub mod workflow;

pub use backend::{ComfyUIBackend, ComfyUIBackendConfig};
