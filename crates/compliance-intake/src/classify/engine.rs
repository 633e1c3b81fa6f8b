use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::rules::{
    ClassificationRule, RuleField, LAB_DATA_CATEGORY, QUARTERLY_REPORT_CATEGORY,
    TABULAR_EXTENSIONS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub state_code: Option<String>,
    pub category: Option<String>,
    pub confidence: Confidence,
    /// Patterns that assigned a field, in table order, plus any override note.
    pub matched_patterns: Vec<String>,
}

impl ClassificationResult {
    pub fn unresolved() -> Self {
        Self {
            state_code: None,
            category: None,
            confidence: Confidence::Low,
            matched_patterns: vec![],
        }
    }
}

/// Filename classifier over an ordered rule table.
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    /// Pre-compiled regex patterns, indexed by pattern string
    compiled_patterns: HashMap<String, Regex>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        let mut compiled_patterns = HashMap::new();
        for rule in &rules {
            if compiled_patterns.contains_key(&rule.pattern) {
                continue;
            }
            match RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
            {
                Ok(regex) => {
                    compiled_patterns.insert(rule.pattern.clone(), regex);
                }
                Err(e) => warn!(pattern = %rule.pattern, error = %e, "Skipping invalid classification pattern"),
            }
        }

        Self {
            rules,
            compiled_patterns,
        }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classifies a filename. Directory components are ignored.
    ///
    /// Each field takes the value of the first matching rule for that field;
    /// the scan always covers the whole table.
    pub fn classify(&self, filename: &str) -> ClassificationResult {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);

        let mut state_code: Option<String> = None;
        let mut category: Option<String> = None;
        let mut matched_patterns = Vec::new();

        for rule in &self.rules {
            let slot = match rule.field {
                RuleField::State => &mut state_code,
                RuleField::Category => &mut category,
            };
            if slot.is_some() {
                continue;
            }
            let Some(regex) = self.compiled_patterns.get(&rule.pattern) else {
                continue;
            };
            if regex.is_match(name) {
                *slot = Some(rule.value.clone());
                matched_patterns.push(rule.pattern.clone());
            }
        }

        if category.as_deref() == Some(QUARTERLY_REPORT_CATEGORY) {
            if let Some(ext) = tabular_extension(name) {
                category = Some(LAB_DATA_CATEGORY.to_string());
                matched_patterns.push(format!(
                    "override:{}->{} (.{})",
                    QUARTERLY_REPORT_CATEGORY, LAB_DATA_CATEGORY, ext
                ));
            }
        }

        let confidence = match (state_code.is_some(), category.is_some()) {
            (true, true) => Confidence::High,
            (false, false) => Confidence::Low,
            _ => Confidence::Medium,
        };

        ClassificationResult {
            state_code,
            category,
            confidence,
            matched_patterns,
        }
    }
}

fn tabular_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    TABULAR_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
