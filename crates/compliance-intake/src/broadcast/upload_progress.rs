//! Upload progress broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::upload::{UploadProgress, UploadStatus};

/// A change to one file's upload progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub file_name: String,
    pub progress: UploadProgress,
    pub timestamp: DateTime<Utc>,
    /// Set when the transfer completed and a queue entry was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_entry_id: Option<String>,
}

impl UploadEvent {
    pub fn new(file_name: &str, progress: UploadProgress) -> Self {
        Self {
            file_name: file_name.to_string(),
            progress,
            timestamp: Utc::now(),
            queue_entry_id: None,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.progress.file_id
    }
}

/// Broadcasts upload events to any number of subscribers.
#[derive(Clone)]
pub struct UploadEventBroadcaster {
    sender: Arc<broadcast::Sender<UploadEvent>>,
}

impl UploadEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: UploadEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one file and publishes its `pending` event.
    pub fn track(&self, file_id: &str, file_name: &str) -> UploadTracker {
        let tracker = UploadTracker {
            file_id: file_id.to_string(),
            file_name: file_name.to_string(),
            sender: Arc::clone(&self.sender),
        };
        tracker.publish(UploadProgress::pending(file_id));
        tracker
    }
}

impl Default for UploadEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Publishes events for a single file.
pub struct UploadTracker {
    file_id: String,
    file_name: String,
    sender: Arc<broadcast::Sender<UploadEvent>>,
}

impl UploadTracker {
    pub fn publish(&self, progress: UploadProgress) {
        let _ = self.sender.send(UploadEvent::new(&self.file_name, progress));
    }

    pub fn status(&self, status: UploadStatus, percent: u8) {
        self.publish(UploadProgress::new(&self.file_id, status, percent));
    }

    pub fn done(&self, queue_entry_id: &str) {
        let mut event = UploadEvent::new(
            &self.file_name,
            UploadProgress::new(&self.file_id, UploadStatus::Done, 100),
        );
        event.queue_entry_id = Some(queue_entry_id.to_string());
        let _ = self.sender.send(event);
    }

    pub fn failed(&self, message: &str) {
        self.publish(UploadProgress::failed(&self.file_id, message));
    }
}
