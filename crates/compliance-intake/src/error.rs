use std::path::PathBuf;
use thiserror::Error;

use crate::auth::AuthorizationError;
use crate::queue::{PersistenceError, QueueError};
use crate::upload::UploadError;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialise logging: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid classification pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid classification rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, IntakeError>;
