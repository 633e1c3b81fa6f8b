//! Bounded-concurrency upload of ready staged files.
//!
//! Two gates bound the work: at most `transfer_concurrency` files hashing or
//! uploading, and at most `hash_concurrency` of those hashing. Files are
//! admitted first-come first-served in the order they were staged.

pub mod hash;
pub mod orchestrator;
pub mod progress;
pub mod transport;

use thiserror::Error;

use crate::auth::AuthorizationError;
use crate::queue::PersistenceError;

pub use hash::{compute_content_hash, hash_file};
pub use orchestrator::{CompletedUpload, FailedUpload, UploadOrchestrator, UploadSummary};
pub use progress::{UploadProgress, UploadStatus};
pub use transport::{TransferError, TransferReceipt, TransferRequest, Transport};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Unauthorized(#[from] AuthorizationError),

    #[error("Failed to hash '{file_name}': {source}")]
    Hash {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Hashing task failed: {0}")]
    HashTask(String),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Failed to record upload: {0}")]
    Queue(#[from] PersistenceError),

    #[error("Upload of {file_id} was cancelled")]
    Cancelled { file_id: String },

    #[error("Upload gate closed")]
    GateClosed,
}
