//! Subscriber WebSocket endpoint.
//!
//! Each connection is registered with the [`NotificationHub`](atelier_events::NotificationHub)
//! and receives every broadcast event until it disconnects.

mod handler;

pub use handler::ws_handler;
