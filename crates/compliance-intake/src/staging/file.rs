use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;

/// A file selected or dropped by the user, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
}

impl CandidateFile {
    /// Reads size from the filesystem and guesses the MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            file_size: metadata.len(),
            mime_type: detect_mime_type(path),
        })
    }

    pub fn new(path: PathBuf, file_size: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let mime_type = detect_mime_type(&path);
        Self {
            path,
            file_name,
            file_size,
            mime_type,
        }
    }
}

fn detect_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}

/// State and/or category chosen by the user in place of the classifier's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverride {
    pub state_code: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub id: String,
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub classification: ClassificationResult,
    pub manual_override: Option<ManualOverride>,
    pub validation_errors: Vec<String>,
    /// Set once, right before transfer.
    pub content_hash: Option<String>,
}

impl StagedFile {
    pub(crate) fn new(candidate: CandidateFile, classification: ClassificationResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: candidate.path,
            file_name: candidate.file_name,
            file_size: candidate.file_size,
            mime_type: candidate.mime_type,
            classification,
            manual_override: None,
            validation_errors: vec![],
            content_hash: None,
        }
    }

    pub fn effective_category(&self) -> Option<&str> {
        self.manual_override
            .as_ref()
            .and_then(|o| o.category.as_deref())
            .or(self.classification.category.as_deref())
    }

    pub fn effective_state_code(&self) -> Option<&str> {
        self.manual_override
            .as_ref()
            .and_then(|o| o.state_code.as_deref())
            .or(self.classification.state_code.as_deref())
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn is_ready(&self) -> bool {
        self.validation_errors.is_empty()
    }
}

/// Fields to merge into a staged file. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct StagedFilePatch {
    pub classification: Option<ClassificationResult>,
    /// `Some(None)` clears the override.
    pub manual_override: Option<Option<ManualOverride>>,
    pub validation_errors: Option<Vec<String>>,
    pub content_hash: Option<String>,
}

impl StagedFilePatch {
    pub(crate) fn apply(self, file: &mut StagedFile) {
        if let Some(classification) = self.classification {
            file.classification = classification;
        }
        if let Some(manual_override) = self.manual_override {
            file.manual_override = manual_override;
        }
        if let Some(errors) = self.validation_errors {
            file.validation_errors = errors;
        }
        if let Some(hash) = self.content_hash {
            file.content_hash = Some(hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Confidence;

    fn staged(name: &str) -> StagedFile {
        StagedFile::new(
            CandidateFile::new(PathBuf::from(format!("/uploads/{}", name)), 10),
            ClassificationResult {
                state_code: Some("KY".to_string()),
                category: Some("dmr".to_string()),
                confidence: Confidence::High,
                matched_patterns: vec![],
            },
        )
    }

    #[test]
    fn test_candidate_detects_mime_type() {
        let candidate = CandidateFile::new(PathBuf::from("/tmp/report.pdf"), 1);
        assert_eq!(candidate.file_name, "report.pdf");
        assert_eq!(candidate.mime_type.as_deref(), Some("application/pdf"));

        let candidate = CandidateFile::new(PathBuf::from("/tmp/blob.xyz123"), 1);
        assert!(candidate.mime_type.is_none());
    }

    #[test]
    fn test_candidate_from_path_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let candidate = CandidateFile::from_path(&path).unwrap();
        assert_eq!(candidate.file_size, 8);
        assert_eq!(candidate.file_name, "lab.csv");
    }

    #[test]
    fn test_override_takes_precedence_per_field() {
        let mut file = staged("ky_dmr.pdf");
        file.manual_override = Some(ManualOverride {
            state_code: None,
            category: Some("permit".to_string()),
        });
        assert_eq!(file.effective_category(), Some("permit"));
        assert_eq!(file.effective_state_code(), Some("KY"));
    }

    #[test]
    fn test_patch_merges_only_given_fields() {
        let mut file = staged("ky_dmr.pdf");
        file.validation_errors = vec!["bad".to_string()];
        StagedFilePatch {
            content_hash: Some("abc".to_string()),
            ..Default::default()
        }
        .apply(&mut file);
        assert_eq!(file.content_hash.as_deref(), Some("abc"));
        assert_eq!(file.validation_errors, vec!["bad".to_string()]);
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(staged("REPORT.XLSX").extension().as_deref(), Some("xlsx"));
        assert_eq!(staged("README").extension(), None);
    }
}
