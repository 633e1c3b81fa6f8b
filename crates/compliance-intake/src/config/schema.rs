use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classify::{default_rules, ClassificationRule};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeConfig {
    pub version: String,
    #[serde(default)]
    pub upload: UploadLimits,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload: UploadLimits::default(),
            classification: ClassificationConfig::default(),
            categories: default_categories(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl IntakeConfig {
    pub fn category(&self, id: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// Admission limits for the upload orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLimits {
    /// Max files hashing or uploading at once.
    #[serde(default = "default_transfer_concurrency")]
    pub transfer_concurrency: usize,
    /// Max files hashing at once. Hashing is CPU-bound, so this stays low.
    #[serde(default = "default_hash_concurrency")]
    pub hash_concurrency: usize,
    #[serde(default = "default_progress_capacity")]
    pub progress_channel_capacity: usize,
}

fn default_transfer_concurrency() -> usize {
    10
}

fn default_hash_concurrency() -> usize {
    2
}

fn default_progress_capacity() -> usize {
    100
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            transfer_concurrency: default_transfer_concurrency(),
            hash_concurrency: default_hash_concurrency(),
            progress_channel_capacity: default_progress_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<ClassificationRule>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// Validation settings for one document category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    pub id: String,
    pub label: String,
    /// Lowercase extensions without the dot.
    pub allowed_extensions: Vec<String>,
    pub max_size_bytes: u64,
    #[serde(default)]
    pub requires_state: bool,
}

impl CategoryConfig {
    pub fn new(
        id: &str,
        label: &str,
        allowed_extensions: &[&str],
        max_size_mb: u64,
        requires_state: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            allowed_extensions: allowed_extensions.iter().map(|e| e.to_string()).collect(),
            max_size_bytes: max_size_mb * 1024 * 1024,
            requires_state,
        }
    }
}

pub fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig::new("dmr", "Discharge Monitoring Report", &["pdf", "xlsx", "xls", "csv"], 50, true),
        CategoryConfig::new("lab_data", "Lab Data", &["xlsx", "xls", "csv", "tsv", "txt", "pdf"], 50, false),
        CategoryConfig::new("quarterly_report", "Quarterly Report", &["pdf", "docx"], 100, true),
        CategoryConfig::new("permit", "Permit", &["pdf"], 100, true),
        CategoryConfig::new("inspection", "Inspection", &["pdf", "jpg", "jpeg", "png"], 50, false),
        CategoryConfig::new("sampling_plan", "Sampling Plan", &["pdf", "docx"], 50, false),
        CategoryConfig::new("corrective_action", "Corrective Action", &["pdf", "docx"], 50, false),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// The configured path, or `~/.compliance-intake/data/intake.db`.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(crate::db::default_database_path)
    }
}
