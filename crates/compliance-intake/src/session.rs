//! One user's intake session: the staging registry, the upload orchestrator
//! and the processing queue built from a single configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::auth::{Permission, PermissionResolver, Role, RoleAssignment};
use crate::broadcast::UploadEventBroadcaster;
use crate::classify::Classifier;
use crate::config::IntakeConfig;
use crate::db::{Database, SqliteQueueRepository};
use crate::error::{ConfigError, IntakeError, Result};
use crate::queue::{ProcessingQueue, QueueRepository};
use crate::staging::{CandidateFile, CategoryRulesValidator, StagingRegistry, Validator};
use crate::upload::{Transport, UploadOrchestrator, UploadSummary};

pub struct IntakeSession {
    config: IntakeConfig,
    classifier: Arc<Classifier>,
    staging: Arc<StagingRegistry>,
    orchestrator: Arc<UploadOrchestrator>,
    queue: ProcessingQueue,
    resolver: PermissionResolver,
}

impl IntakeSession {
    pub fn new(
        config: IntakeConfig,
        validator: Arc<dyn Validator>,
        transport: Arc<dyn Transport>,
        repo: Arc<dyn QueueRepository>,
        assignments: Vec<RoleAssignment>,
    ) -> Self {
        let classifier = Arc::new(Classifier::new(config.classification.rules.clone()));
        let staging = Arc::new(StagingRegistry::new(
            Arc::clone(&classifier),
            validator,
            config.categories.clone(),
        ));
        let events = UploadEventBroadcaster::new(config.upload.progress_channel_capacity);
        let orchestrator = Arc::new(UploadOrchestrator::new(
            config.upload,
            transport,
            Arc::clone(&repo),
            events,
        ));

        Self {
            config,
            classifier,
            staging,
            orchestrator,
            queue: ProcessingQueue::new(repo),
            resolver: PermissionResolver::new(assignments),
        }
    }

    /// Builds a session over the SQLite database named in the config, with
    /// the built-in category validator.
    pub fn open(
        config: IntakeConfig,
        transport: Arc<dyn Transport>,
        assignments: Vec<RoleAssignment>,
    ) -> Result<Self> {
        let path = config
            .database
            .resolved_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "No database path configured and no home directory found".to_string(),
            })?;
        let db = Database::open(&path)?;
        info!(path = %path.display(), "Opened intake database");

        Ok(Self::new(
            config,
            Arc::new(CategoryRulesValidator),
            transport,
            Arc::new(SqliteQueueRepository::new(db)),
            assignments,
        ))
    }

    /// Reads size and type for each path and stages the files in order.
    pub fn stage_paths(&self, paths: &[PathBuf]) -> Result<Vec<String>> {
        let candidates = paths
            .iter()
            .map(|path| {
                CandidateFile::from_path(path).map_err(|source| IntakeError::ReadFile {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.staging.add(candidates))
    }

    /// Uploads every ready staged file, if the session may upload to `site`.
    pub async fn submit(&self, site: Option<&str>) -> Result<UploadSummary> {
        Ok(self
            .orchestrator
            .upload_ready(&self.staging, &self.resolver, site)
            .await?)
    }

    pub fn cancel(&self, file_id: &str) -> bool {
        self.orchestrator.cancel(file_id)
    }

    /// Gate for actions performed outside this crate, such as a retry or an
    /// export.
    pub fn authorize(&self, permission: Permission, site: Option<&str>) -> Result<Role> {
        Ok(self.resolver.require(permission, site)?)
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub fn staging(&self) -> &Arc<StagingRegistry> {
        &self.staging
    }

    pub fn orchestrator(&self) -> &Arc<UploadOrchestrator> {
        &self.orchestrator
    }

    pub fn queue(&self) -> &ProcessingQueue {
        &self.queue
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }
}
