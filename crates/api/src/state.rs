use std::sync::Arc;

use atelier_core::store::JobStore;
use atelier_events::NotificationHub;

use crate::config::ServerConfig;
use crate::engine::GenerationRunner;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job persistence (PostgreSQL in production, in-memory in tests).
    pub store: Arc<dyn JobStore>,
    /// Subscriber registry and broadcast fan-out.
    pub hub: Arc<NotificationHub>,
    /// Drives generation jobs on tracked background tasks.
    pub runner: Arc<GenerationRunner>,
}
