use axum::routing::post;
use axum::Router;

use atelier_events::relay::BROADCAST_PATH;

use crate::handlers::broadcast;
use crate::state::AppState;

/// The peer endpoint lives outside `/api/v1` so every instance agrees on
/// its path.
pub fn router() -> Router<AppState> {
    Router::new().route(BROADCAST_PATH, post(broadcast::receive_broadcast))
}
