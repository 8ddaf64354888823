//! Inbound peer broadcasts.

use atelier_events::{BroadcastOutcome, NotificationEvent};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::peer::BroadcastCaller;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BroadcastReceipt {
    pub delivered: usize,
    pub pruned: usize,
}

/// POST /api/broadcast
///
/// Fan a peer's event out to this instance's subscribers. Always local:
/// relayed events are never relayed again.
pub async fn receive_broadcast(
    caller: BroadcastCaller,
    State(state): State<AppState>,
    Json(event): Json<NotificationEvent>,
) -> AppResult<impl IntoResponse> {
    tracing::debug!(caller = %caller.addr, kind = event.kind(), "Peer broadcast received");

    let receipt = match state.hub.broadcast_local(&event).await {
        BroadcastOutcome::Local { delivered, pruned } => BroadcastReceipt { delivered, pruned },
        BroadcastOutcome::Relayed => BroadcastReceipt {
            delivered: 0,
            pruned: 0,
        },
    };

    Ok(Json(DataResponse { data: receipt }))
}
