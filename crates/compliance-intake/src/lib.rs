//! Intake pipeline for regulatory-compliance documents.
//!
//! Files are classified from their names, validated against category rules
//! while staged, uploaded under bounded concurrency, and then tracked through
//! server-side processing until imported or failed.

pub mod auth;
pub mod broadcast;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod failure;
pub mod queue;
pub mod session;
pub mod staging;
pub mod telemetry;
pub mod upload;

pub use auth::{AuthorizationError, Permission, PermissionResolver, Role, RoleAssignment};
pub use broadcast::{UploadEvent, UploadEventBroadcaster};
pub use classify::{ClassificationResult, ClassificationRule, Classifier, Confidence, RuleField};
pub use config::{load_config, load_config_from_str, IntakeConfig};
pub use error::{ConfigError, IntakeError, Result};
pub use failure::{classify_error, is_retryable_error, user_message, ClassifiedError, ErrorKind};
pub use queue::{
    MemoryQueueRepository, PersistenceError, ProcessingQueue, QueueEntry, QueueError,
    QueueRepository, QueueStatus,
};
pub use session::IntakeSession;
pub use staging::{CandidateFile, StagedFile, StagingRegistry, Validator};
pub use upload::{Transport, UploadError, UploadOrchestrator, UploadProgress, UploadStatus};
