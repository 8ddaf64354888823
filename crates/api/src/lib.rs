//! HTTP and WebSocket surface of the generation service.
//!
//! The binary in `main.rs` wires the pieces; integration tests build the
//! same router through [`router::build_app_router`].

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod net;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
