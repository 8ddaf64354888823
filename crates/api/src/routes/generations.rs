use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// POST   /        -> submit_generation
/// GET    /{id}    -> get_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generations::submit_generation))
        .route("/{id}", get(generations::get_generation))
}
