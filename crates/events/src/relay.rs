//! Single-hop relay of events to a peer instance.
//!
//! [`PeerRelay`] POSTs the event JSON verbatim to `<peer>/api/broadcast`.
//! There is no retry; a failed relay is reported to the caller.

use std::time::Duration;

use crate::event::NotificationEvent;

/// Path of the peer's inbound relay endpoint.
pub const BROADCAST_PATH: &str = "/api/broadcast";

/// HTTP request timeout for one relay attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The peer returned a non-2xx status code.
    #[error("Peer returned HTTP {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Clone)]
pub struct PeerRelay {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl PeerRelay {
    /// * `peer_url` - base URL of the peer, e.g. `http://gallery-2:3000`.
    pub fn new(peer_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{BROADCAST_PATH}", peer_url.trim_end_matches('/')),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one event to the peer.
    pub async fn send(&self, event: &NotificationEvent) -> Result<(), RelayError> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(event);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RelayError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}
