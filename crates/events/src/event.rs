//! Notification event shapes.
//!
//! ```json
//! {"type": "new_photo", "photo_path": "2024/03/07/<id>.png",
//!  "photo_url": "/photo/2024/03/07/<id>.png", "task": { ... } }
//! {"type": "ping"}
//! {"type": "pong", "timestamp": "2024-03-07T15:04:05Z"}
//! ```

use atelier_core::job::JobSummary;
use atelier_core::storage::photo_url;
use atelier_core::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Messages pushed to (or received from) subscribers and peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    NewPhoto(PhotoEvent),
    PhotoUpdated(PhotoEvent),
    Ping,
    Pong { timestamp: Timestamp },
}

/// Payload of `new_photo` / `photo_updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoEvent {
    /// Storage path relative to the artifact root.
    pub photo_path: String,
    pub photo_url: String,
    #[serde(default)]
    pub task: Option<JobSummary>,
}

impl PhotoEvent {
    pub fn new(photo_path: &str, task: Option<JobSummary>) -> Self {
        Self {
            photo_path: photo_path.to_string(),
            photo_url: photo_url(photo_path),
            task,
        }
    }
}

impl NotificationEvent {
    pub fn new_photo(photo_path: &str, task: Option<JobSummary>) -> Self {
        Self::NewPhoto(PhotoEvent::new(photo_path, task))
    }

    pub fn photo_updated(photo_path: &str, task: Option<JobSummary>) -> Self {
        Self::PhotoUpdated(PhotoEvent::new(photo_path, task))
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: chrono::Utc::now(),
        }
    }

    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewPhoto(_) => "new_photo",
            Self::PhotoUpdated(_) => "photo_updated",
            Self::Ping => "ping",
            Self::Pong { .. } => "pong",
        }
    }
}
