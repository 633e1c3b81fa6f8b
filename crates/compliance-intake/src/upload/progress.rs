use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-file upload status. Files move `pending -> hashing -> uploading -> done`,
/// or to `error` from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Hashing,
    Uploading,
    Done,
    Error,
}

impl UploadStatus {
    /// Whether the file holds a transfer slot.
    pub fn is_active(self) -> bool {
        matches!(self, UploadStatus::Hashing | UploadStatus::Uploading)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Pending => write!(f, "Waiting"),
            UploadStatus::Hashing => write!(f, "Hashing"),
            UploadStatus::Uploading => write!(f, "Uploading"),
            UploadStatus::Done => write!(f, "Done"),
            UploadStatus::Error => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_id: String,
    /// 0 to 100.
    pub percent: u8,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    pub fn new(file_id: &str, status: UploadStatus, percent: u8) -> Self {
        Self {
            file_id: file_id.to_string(),
            percent: percent.min(100),
            status,
            error: None,
        }
    }

    pub fn pending(file_id: &str) -> Self {
        Self::new(file_id, UploadStatus::Pending, 0)
    }

    pub fn failed(file_id: &str, message: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            percent: 0,
            status: UploadStatus::Error,
            error: Some(message.to_string()),
        }
    }
}
