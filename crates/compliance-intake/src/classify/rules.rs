use serde::{Deserialize, Serialize};

/// Jurisdictions a queue entry's state code may be auto-filled with.
pub const VALID_STATE_CODES: [&str; 5] = ["KY", "WV", "VA", "TN", "AL"];

pub const QUARTERLY_REPORT_CATEGORY: &str = "quarterly_report";
pub const LAB_DATA_CATEGORY: &str = "lab_data";

/// Extensions of files that carry rows of lab results rather than a report.
pub const TABULAR_EXTENSIONS: [&str; 5] = ["xlsx", "xls", "csv", "tsv", "txt"];

pub fn is_valid_state_code(code: &str) -> bool {
    VALID_STATE_CODES.contains(&code)
}

/// Which classification field a rule assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    State,
    Category,
}

/// One row of the ordered rule table. `pattern` is a regex matched
/// case-insensitively against the bare filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    pub field: RuleField,
    pub value: String,
}

impl ClassificationRule {
    pub fn state(pattern: &str, code: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            field: RuleField::State,
            value: code.to_string(),
        }
    }

    pub fn category(pattern: &str, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            field: RuleField::Category,
            value: category.to_string(),
        }
    }
}

// Filenames use `_`, `-` and spaces as separators, and `\b` treats `_` as a
// word character, so tokens are delimited by "not a letter" instead.
macro_rules! token {
    ($alts:literal) => {
        concat!("(?:^|[^a-z])(?:", $alts, ")(?:[^a-z]|$)")
    };
}

/// The built-in rule table.
///
/// West Virginia precedes Virginia so that "west_virginia" resolves to WV
/// before the Virginia rule can claim the state field.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::state(token!("wv|wva|west[ _-]?virginia"), "WV"),
        ClassificationRule::state(token!("ky|kentucky"), "KY"),
        ClassificationRule::state(token!("va|virginia"), "VA"),
        ClassificationRule::state(token!("tn|tennessee"), "TN"),
        ClassificationRule::state(token!("al|alabama"), "AL"),
        ClassificationRule::category(
            r"(?:^|[^a-z])e?dmr(?:[^a-z]|$)|netdmr|discharge[ _-]?monitoring",
            "dmr",
        ),
        ClassificationRule::category(
            r"lab[ _-]?(?:data|results?|report)|analytical|chain[ _-]?of[ _-]?custody|(?:^|[^a-z])coc(?:[^a-z]|$)",
            LAB_DATA_CATEGORY,
        ),
        ClassificationRule::category(
            r"quarterly|(?:^|[^a-z0-9])q[1-4](?:[^a-z0-9]|$)",
            QUARTERLY_REPORT_CATEGORY,
        ),
        ClassificationRule::category(
            r"inspection|violation|(?:^|[^a-z])nov(?:[^a-z]|$)",
            "inspection",
        ),
        ClassificationRule::category(
            r"sampling[ _-]?plan|(?:^|[^a-z])sap(?:[^a-z]|$)",
            "sampling_plan",
        ),
        ClassificationRule::category(
            r"corrective[ _-]?action|(?:^|[^a-z])cap(?:[^a-z]|$)",
            "corrective_action",
        ),
        ClassificationRule::category(r"permit|npdes", "permit"),
    ]
}
