//! Event streaming for an external push layer.

pub mod upload_progress;

pub use upload_progress::{UploadEvent, UploadEventBroadcaster, UploadTracker};
