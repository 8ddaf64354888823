//! Guard for the peer broadcast endpoint.

use std::net::SocketAddr;

use atelier_core::error::CoreError;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// A caller admitted to `POST /api/broadcast`.
///
/// The remote address must fall inside one of the configured allow-listed
/// networks, and when a broadcast token is configured the request must
/// carry it as `Authorization: Bearer <token>`.
///
/// The router must be served with connect info
/// (`into_make_service_with_connect_info::<SocketAddr>()`); without it
/// every caller is refused.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastCaller {
    pub addr: SocketAddr,
}

impl FromRequestParts<AppState> for BroadcastCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ConnectInfo(addr) = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                AppError::Core(CoreError::Forbidden("Caller address unavailable".into()))
            })?;

        let allowed = state
            .config
            .broadcast_allowed_networks
            .iter()
            .any(|net| net.contains(addr.ip()));
        if !allowed {
            tracing::warn!(caller = %addr, "Broadcast refused: caller not in allowed networks");
            return Err(AppError::Core(CoreError::Forbidden(
                "Caller is not allowed to broadcast".into(),
            )));
        }

        if let Some(expected) = state.config.broadcast_token.as_deref() {
            let token = parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Core(CoreError::Unauthorized(
                        "Missing broadcast token. Expected: Bearer <token>".into(),
                    ))
                })?;
            if token != expected {
                tracing::warn!(caller = %addr, "Broadcast refused: bad token");
                return Err(AppError::Core(CoreError::Unauthorized(
                    "Invalid broadcast token".into(),
                )));
            }
        }

        Ok(BroadcastCaller { addr })
    }
}
