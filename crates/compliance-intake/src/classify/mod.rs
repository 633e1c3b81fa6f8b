pub mod engine;
pub mod rules;

pub use engine::{ClassificationResult, Classifier, Confidence};
pub use rules::{
    default_rules, is_valid_state_code, ClassificationRule, RuleField, LAB_DATA_CATEGORY,
    QUARTERLY_REPORT_CATEGORY, TABULAR_EXTENSIONS, VALID_STATE_CODES,
};
