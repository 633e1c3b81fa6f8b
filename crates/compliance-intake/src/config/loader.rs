use std::collections::HashSet;
use std::path::Path;

use crate::classify::{is_valid_state_code, RuleField};
use crate::config::schema::IntakeConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IntakeConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<IntakeConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: IntakeConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &IntakeConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let limits = &config.upload;
    if limits.transfer_concurrency == 0 || limits.hash_concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "Concurrency limits must be greater than zero".to_string(),
        });
    }
    if limits.hash_concurrency > limits.transfer_concurrency {
        return Err(ConfigError::Validation {
            message: format!(
                "hashConcurrency ({}) may not exceed transferConcurrency ({})",
                limits.hash_concurrency, limits.transfer_concurrency
            ),
        });
    }

    let mut category_ids = HashSet::new();
    for category in &config.categories {
        if !category_ids.insert(category.id.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate category ID: {}", category.id),
            });
        }
    }

    for (index, rule) in config.classification.rules.iter().enumerate() {
        if let Err(e) = regex::RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
        {
            return Err(ConfigError::InvalidPattern {
                pattern: rule.pattern.clone(),
                reason: e.to_string(),
            });
        }

        match rule.field {
            RuleField::State if !is_valid_state_code(&rule.value) => {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: format!("'{}' is not a valid state code", rule.value),
                });
            }
            RuleField::Category if !category_ids.contains(rule.value.as_str()) => {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: format!("Unknown category '{}'", rule.value),
                });
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.upload.transfer_concurrency, 10);
        assert_eq!(config.upload.hash_concurrency, 2);
        assert!(!config.classification.rules.is_empty());
        assert!(config.category("lab_data").is_some());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_default_config_is_valid() {
        validate_config(&IntakeConfig::default()).unwrap();
    }

    #[test]
    fn test_load_custom_rules_and_categories() {
        let config_json = r#"
        {
            "version": "1.0",
            "upload": { "transferConcurrency": 4, "hashConcurrency": 1 },
            "classification": {
                "rules": [
                    { "pattern": "kentucky", "field": "state", "value": "KY" },
                    { "pattern": "assay", "field": "category", "value": "lab_data" }
                ]
            },
            "categories": [
                { "id": "lab_data", "label": "Lab Data", "allowedExtensions": ["csv"], "maxSizeBytes": 1024 }
            ],
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.upload.transfer_concurrency, 4);
        assert_eq!(config.classification.rules.len(), 2);
        assert_eq!(config.categories.len(), 1);
        assert!(!config.categories[0].requires_state);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unsupported_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_keys() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workers": 3 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_zero_limit() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "upload": { "hashConcurrency": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_hash_limit_above_transfer_limit() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "upload": { "transferConcurrency": 2, "hashConcurrency": 3 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_rule_pattern() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "classification": { "rules": [
                { "pattern": "[open", "field": "category", "value": "permit" }
            ] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_rule_with_unknown_state() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "classification": { "rules": [
                { "pattern": "ohio", "field": "state", "value": "OH" }
            ] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidRule { index: 0, .. })));
    }

    #[test]
    fn test_rule_with_unknown_category() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "classification": { "rules": [
                { "pattern": "ky", "field": "state", "value": "KY" },
                { "pattern": "memo", "field": "category", "value": "memo" }
            ] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidRule { index: 1, .. })));
    }

    #[test]
    fn test_duplicate_category() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "classification": { "rules": [] }, "categories": [
                { "id": "permit", "label": "Permit", "allowedExtensions": ["pdf"], "maxSizeBytes": 10 },
                { "id": "permit", "label": "Permit", "allowedExtensions": ["pdf"], "maxSizeBytes": 10 }
            ] }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/intake.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.json");
        std::fs::write(&path, r#"{ "version": "1.0" }"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.version, "1.0");
    }
}
