//! Artifact notifications for live viewers.
//!
//! - [`NotificationHub`] -- registry of subscriber connections with local
//!   fan-out, or single-hop relay to a peer instance.
//! - [`NotificationEvent`] -- the wire shape of every pushed message.
//! - [`PeerRelay`] -- HTTP client for the peer's `/api/broadcast` endpoint.

pub mod event;
pub mod hub;
pub mod relay;

pub use event::{NotificationEvent, PhotoEvent};
pub use hub::{BroadcastOutcome, NotificationHub, Outbound};
pub use relay::{PeerRelay, RelayError};
