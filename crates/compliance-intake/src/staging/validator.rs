use crate::classify::is_valid_state_code;
use crate::config::CategoryConfig;

use super::file::StagedFile;

/// Checks a staged file against its resolved category configuration.
/// An empty result means the file is valid.
pub trait Validator: Send + Sync {
    fn validate(&self, file: &StagedFile, category: Option<&CategoryConfig>) -> Vec<String>;
}

/// Size, extension and required-field checks driven by [`CategoryConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryRulesValidator;

impl Validator for CategoryRulesValidator {
    fn validate(&self, file: &StagedFile, category: Option<&CategoryConfig>) -> Vec<String> {
        let mut errors = Vec::new();

        if file.file_size == 0 {
            errors.push("File is empty".to_string());
        }

        if let Some(state) = file.effective_state_code() {
            if !is_valid_state_code(state) {
                errors.push(format!("Unknown state code '{}'", state));
            }
        }

        let Some(config) = category else {
            match file.effective_category() {
                Some(unknown) => errors.push(format!("Unknown category '{}'", unknown)),
                None => errors.push(
                    "Category could not be determined from the filename; choose one".to_string(),
                ),
            }
            return errors;
        };

        match file.extension() {
            Some(ext) if config.allowed_extensions.iter().any(|a| *a == ext) => {}
            Some(ext) => errors.push(format!(
                "'.{}' files are not accepted for {}; expected one of: {}",
                ext,
                config.label,
                config.allowed_extensions.join(", ")
            )),
            None => errors.push(format!("{} files need a file extension", config.label)),
        }

        if file.file_size > config.max_size_bytes {
            errors.push(format!(
                "File is {} bytes; {} files may be at most {} bytes",
                file.file_size, config.label, config.max_size_bytes
            ));
        }

        if config.requires_state && file.effective_state_code().is_none() {
            errors.push(format!("{} files need a state; choose one", config.label));
        }

        errors
    }
}
