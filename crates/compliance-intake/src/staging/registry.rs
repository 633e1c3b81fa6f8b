use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::classify::Classifier;
use crate::config::CategoryConfig;
use crate::telemetry::redact_path;

use super::file::{CandidateFile, ManualOverride, StagedFile, StagedFilePatch};
use super::validator::Validator;

/// Ordered set of staged files. Insertion order is kept and drives upload
/// admission order.
pub struct StagingRegistry {
    classifier: Arc<Classifier>,
    validator: Arc<dyn Validator>,
    categories: Vec<CategoryConfig>,
    files: RwLock<Vec<StagedFile>>,
}

impl StagingRegistry {
    pub fn new(
        classifier: Arc<Classifier>,
        validator: Arc<dyn Validator>,
        categories: Vec<CategoryConfig>,
    ) -> Self {
        Self {
            classifier,
            validator,
            categories,
            files: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<StagedFile>> {
        match self.files.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Staging registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<StagedFile>> {
        match self.files.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Staging registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn category_config(&self, id: Option<&str>) -> Option<&CategoryConfig> {
        id.and_then(|id| self.categories.iter().find(|c| c.id == id))
    }

    fn validate(&self, file: &StagedFile) -> Vec<String> {
        let category = self.category_config(file.effective_category());
        self.validator.validate(file, category)
    }

    /// Classifies and validates each candidate, then appends it. Returns the
    /// new IDs in input order.
    pub fn add(&self, candidates: Vec<CandidateFile>) -> Vec<String> {
        let staged: Vec<StagedFile> = candidates
            .into_iter()
            .map(|candidate| {
                let classification = self.classifier.classify(&candidate.file_name);
                let mut file = StagedFile::new(candidate, classification);
                file.validation_errors = self.validate(&file);
                debug!(
                    file_id = %file.id,
                    file = %redact_path(&file.path),
                    confidence = ?file.classification.confidence,
                    violations = file.validation_errors.len(),
                    "Staged file"
                );
                file
            })
            .collect();

        let ids = staged.iter().map(|f| f.id.clone()).collect();
        self.write().extend(staged);
        ids
    }

    /// Removes one file. Returns false if it was not staged.
    pub fn remove(&self, id: &str) -> bool {
        let mut files = self.write();
        let before = files.len();
        files.retain(|f| f.id != id);
        files.len() != before
    }

    /// Merges `patch` into one file. Returns false if it was not staged.
    pub fn update(&self, id: &str, patch: StagedFilePatch) -> bool {
        let mut files = self.write();
        match files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                patch.apply(file);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut files = self.write();
        info!(count = files.len(), "Clearing staging registry");
        files.clear();
    }

    /// Files with no validation errors, in insertion order.
    pub fn ready_files(&self) -> Vec<StagedFile> {
        self.read().iter().filter(|f| f.is_ready()).cloned().collect()
    }

    pub fn files(&self) -> Vec<StagedFile> {
        self.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<StagedFile> {
        self.read().iter().find(|f| f.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replaces the manual override and re-validates. Pass `None` for both
    /// fields to clear it.
    pub fn set_override(
        &self,
        id: &str,
        state_code: Option<String>,
        category: Option<String>,
    ) -> bool {
        let manual_override = if state_code.is_none() && category.is_none() {
            None
        } else {
            Some(ManualOverride {
                state_code: state_code.map(|s| s.trim().to_ascii_uppercase()),
                category,
            })
        };
        let updated = self.update(
            id,
            StagedFilePatch {
                manual_override: Some(manual_override),
                ..Default::default()
            },
        );
        updated && self.revalidate(id)
    }

    /// Runs the classifier again and re-validates.
    pub fn reclassify(&self, id: &str) -> bool {
        let mut files = self.write();
        let Some(file) = files.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        file.classification = self.classifier.classify(&file.file_name);
        file.validation_errors = self.validate(file);
        true
    }

    pub fn revalidate(&self, id: &str) -> bool {
        let mut files = self.write();
        let Some(file) = files.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        file.validation_errors = self.validate(file);
        debug!(file_id = %id, violations = file.validation_errors.len(), "Revalidated file");
        true
    }

    /// Stores the content hash unless one is already set.
    pub fn set_content_hash(&self, id: &str, hash: String) -> bool {
        let mut files = self.write();
        match files.iter_mut().find(|f| f.id == id) {
            Some(file) if file.content_hash.is_none() => {
                file.content_hash = Some(hash);
                true
            }
            _ => false,
        }
    }
}
