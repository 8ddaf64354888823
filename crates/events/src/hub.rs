//! Subscriber registry and event fan-out.
//!
//! The hub is constructed once at startup and shared via `Arc`. Each
//! subscriber is an unbounded channel drained by its WebSocket task; a
//! failed send means the task is gone and the subscriber is pruned.

use std::collections::HashMap;

use atelier_core::job::JobSummary;
use tokio::sync::{mpsc, RwLock};

use crate::event::NotificationEvent;
use crate::relay::{PeerRelay, RelayError};

/// Frame queued for a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Channel sender half for pushing frames to a subscriber.
pub type SubscriberSender = mpsc::UnboundedSender<Outbound>;

/// Where a broadcast went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Handed to the configured peer; no local sends.
    Relayed,
    /// Sent to local subscribers.
    Local { delivered: usize, pruned: usize },
}

pub struct NotificationHub {
    subscribers: RwLock<HashMap<String, SubscriberSender>>,
    relay: Option<PeerRelay>,
}

impl NotificationHub {
    /// A hub that fans out locally.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            relay: None,
        }
    }

    /// A hub whose [`broadcast`](Self::broadcast) relays to a peer instead.
    pub fn with_relay(relay: PeerRelay) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            relay: Some(relay),
        }
    }

    pub fn relay(&self) -> Option<&PeerRelay> {
        self.relay.as_ref()
    }

    /// Register a subscriber. The caller forwards frames from the returned
    /// receiver to the socket.
    pub async fn subscribe(&self, conn_id: String) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.insert(conn_id, tx);
        rx
    }

    pub async fn unsubscribe(&self, conn_id: &str) {
        self.subscribers.write().await.remove(conn_id);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Announce an event: relay to the peer when one is configured,
    /// otherwise fan out locally.
    pub async fn broadcast(&self, event: &NotificationEvent) -> Result<BroadcastOutcome, RelayError> {
        match &self.relay {
            Some(relay) => {
                relay.send(event).await.inspect_err(|e| {
                    tracing::warn!(peer = %relay.url(), kind = event.kind(), error = %e, "Peer relay failed");
                })?;
                tracing::debug!(peer = %relay.url(), kind = event.kind(), "Relayed event to peer");
                Ok(BroadcastOutcome::Relayed)
            }
            None => Ok(self.broadcast_local(event).await),
        }
    }

    /// Serialize once and send to every local subscriber, pruning those
    /// whose channel is closed.
    pub async fn broadcast_local(&self, event: &NotificationEvent) -> BroadcastOutcome {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(kind = event.kind(), error = %e, "Failed to serialize event");
                return BroadcastOutcome::Local {
                    delivered: 0,
                    pruned: 0,
                };
            }
        };

        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|conn_id, sender| {
            let ok = sender.send(Outbound::Text(text.clone())).is_ok();
            if !ok {
                tracing::debug!(conn_id = %conn_id, "Pruning closed subscriber");
            }
            ok
        });
        let delivered = subscribers.len();
        let pruned = before - delivered;
        tracing::debug!(kind = event.kind(), delivered, pruned, "Broadcast event");
        BroadcastOutcome::Local { delivered, pruned }
    }

    /// Announce a newly stored artifact.
    pub async fn notify_new_artifact(
        &self,
        photo_path: &str,
        task: Option<JobSummary>,
    ) -> Result<BroadcastOutcome, RelayError> {
        self.broadcast(&NotificationEvent::new_photo(photo_path, task))
            .await
    }

    /// Announce a changed artifact (e.g. metadata edited).
    pub async fn notify_artifact_updated(
        &self,
        photo_path: &str,
        task: Option<JobSummary>,
    ) -> Result<BroadcastOutcome, RelayError> {
        self.broadcast(&NotificationEvent::photo_updated(photo_path, task))
            .await
    }

    /// Handle a text frame from subscriber `conn_id`. Only `ping` is
    /// answered; returns `true` if a reply was queued.
    pub async fn handle_inbound(&self, conn_id: &str, text: &str) -> bool {
        let Some(reply) = reply_to_inbound(text) else {
            return false;
        };
        let Ok(reply) = serde_json::to_string(&reply) else {
            return false;
        };
        let subscribers = self.subscribers.read().await;
        subscribers
            .get(conn_id)
            .is_some_and(|sender| sender.send(Outbound::Text(reply)).is_ok())
    }

    /// Queue a close frame for every subscriber and clear the registry.
    pub async fn shutdown_all(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len();
        for sender in subscribers.values() {
            let _ = sender.send(Outbound::Close);
        }
        subscribers.clear();
        tracing::info!(count, "Closed all subscriber connections");
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply owed for an inbound frame: `pong` for `{"type":"ping"}`, nothing
/// for anything else. Malformed JSON is dropped.
pub fn reply_to_inbound(text: &str) -> Option<NotificationEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed inbound message");
            return None;
        }
    };
    match value.get("type").and_then(|t| t.as_str()) {
        Some("ping") => Some(NotificationEvent::pong()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn local_broadcast_reaches_all_and_prunes_closed() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe("a".into()).await;
        let mut b = hub.subscribe("b".into()).await;
        let closed = hub.subscribe("c".into()).await;
        drop(closed);

        let outcome = hub
            .notify_new_artifact("2024/01/02/x.png", None)
            .await
            .unwrap();

        assert_eq!(outcome, BroadcastOutcome::Local { delivered: 2, pruned: 1 });
        assert_eq!(hub.subscriber_count().await, 2);
        for rx in [&mut a, &mut b] {
            let Some(Outbound::Text(text)) = rx.recv().await else {
                panic!("expected a text frame");
            };
            let json: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(json["type"], "new_photo");
            assert_eq!(json["photo_url"], "/photo/2024/01/02/x.png");
        }
    }

    #[tokio::test]
    async fn relay_replaces_local_fan_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/broadcast"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let hub = NotificationHub::with_relay(PeerRelay::new(&server.uri(), None));
        let mut rx = hub.subscribe("a".into()).await;

        let outcome = hub.notify_artifact_updated("p.png", None).await.unwrap();

        assert_eq!(outcome, BroadcastOutcome::Relayed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_local_ignores_relay() {
        let hub = NotificationHub::with_relay(PeerRelay::new("http://127.0.0.1:9", None));
        let mut rx = hub.subscribe("a".into()).await;

        let outcome = hub
            .broadcast_local(&NotificationEvent::new_photo("p.png", None))
            .await;

        assert_eq!(outcome, BroadcastOutcome::Local { delivered: 1, pruned: 0 });
        assert_matches!(rx.try_recv(), Ok(Outbound::Text(_)));
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe("a".into()).await;

        assert!(hub.handle_inbound("a", r#"{"type":"ping"}"#).await);
        let Ok(Outbound::Text(text)) = rx.try_recv() else {
            panic!("expected pong");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "pong");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn other_inbound_frames_are_ignored() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe("a".into()).await;

        assert!(!hub.handle_inbound("a", r#"{"type":"hello"}"#).await);
        assert!(!hub.handle_inbound("a", "{not json").await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_closes_everyone() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe("a".into()).await;
        let mut b = hub.subscribe("b".into()).await;

        hub.shutdown_all().await;

        assert_eq!(hub.subscriber_count().await, 0);
        assert_eq!(a.recv().await, Some(Outbound::Close));
        assert_eq!(b.recv().await, Some(Outbound::Close));
        // senders were dropped with the registry
        assert_eq!(a.recv().await, None);
    }
}
