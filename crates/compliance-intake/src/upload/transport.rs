use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// What the transport needs to move one file.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub file_id: &'a str,
    pub path: &'a Path,
    pub file_name: &'a str,
    pub file_size: u64,
    pub mime_type: Option<&'a str>,
    pub content_hash: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Where the object store put the bytes.
    pub storage_key: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransferError {
    pub message: String,
}

impl TransferError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Moves file bytes to durable storage.
///
/// Implementations report progress as a percentage through `progress`. They
/// do not retry; a failed transfer is reported once and surfaced to the user.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn transfer(
        &self,
        request: TransferRequest<'_>,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<TransferReceipt, TransferError>;
}
