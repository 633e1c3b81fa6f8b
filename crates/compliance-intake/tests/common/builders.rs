//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use compliance_intake::classify::ClassificationRule;
use compliance_intake::config::{CategoryConfig, IntakeConfig};
use compliance_intake::queue::{NewQueueEntry, QueueEntry};

/// Builder for creating `IntakeConfig` instances.
pub struct ConfigBuilder {
    config: IntakeConfig,
}

impl ConfigBuilder {
    /// Built-in rules and categories, with a progress channel large enough
    /// that tests never lag.
    pub fn new() -> Self {
        let mut config = IntakeConfig::default();
        config.upload.progress_channel_capacity = 4096;
        Self { config }
    }

    pub fn transfer_concurrency(mut self, limit: usize) -> Self {
        self.config.upload.transfer_concurrency = limit;
        self
    }

    pub fn hash_concurrency(mut self, limit: usize) -> Self {
        self.config.upload.hash_concurrency = limit;
        self
    }

    /// Replace the whole rule table.
    pub fn rules(mut self, rules: Vec<ClassificationRule>) -> Self {
        self.config.classification.rules = rules;
        self
    }

    pub fn category(mut self, category: CategoryConfig) -> Self {
        self.config.categories.retain(|c| c.id != category.id);
        self.config.categories.push(category);
        self
    }

    pub fn build(self) -> IntakeConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for queue entries in the `uploaded` state.
pub struct QueueEntryBuilder {
    new: NewQueueEntry,
}

impl QueueEntryBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            new: NewQueueEntry {
                id: id.to_string(),
                file_name: format!("{}.csv", id),
                storage_key: format!("uploads/{}", id),
                content_hash: None,
                file_size: 128,
                mime_type: Some("text/csv".to_string()),
                category: Some("lab_data".to_string()),
                state_code: None,
            },
        }
    }

    pub fn file_name(mut self, name: &str) -> Self {
        self.new.file_name = name.to_string();
        self
    }

    pub fn state_code(mut self, code: &str) -> Self {
        self.new.state_code = Some(code.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.new.category = Some(category.to_string());
        self
    }

    pub fn build(self) -> QueueEntry {
        QueueEntry::uploaded(self.new)
    }
}
