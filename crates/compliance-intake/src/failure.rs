//! Failure taxonomy shared by every failure path.
//!
//! Raw failure text is classified into a user-facing message by an ordered
//! list of case-insensitive substring rules. Retryability is judged by a
//! separate keyword set so the two verdicts can disagree for the same kind.

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept from a raw failure message.
pub const MAX_DETAIL_CHARS: usize = 800;

/// Appended to raw text that was cut at [`MAX_DETAIL_CHARS`].
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// The kind of failure a raw message was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    HeaderMismatch,
    EmptyFile,
    MissingWorksheet,
    RowLimitExceeded,
    UnsupportedFormat,
    PasswordProtected,
    CorruptFile,
    ArchiveExtraction,
    ResourceExhausted,
    Timeout,
    StorageAccess,
    Database,
    NetDmrFormat,
    UnmappedParameterCode,
    PermitNotFound,
    OutfallNotFound,
    Unclassified,
}

struct TaxonomyRule {
    kind: ErrorKind,
    /// Any of these (lowercase) substrings selects the rule.
    needles: &'static [&'static str],
    /// Like `needles`, but only when not joined to a neighbouring letter or digit.
    tokens: &'static [&'static str],
    message: &'static str,
}

/// Evaluated top to bottom; the first rule with a matching needle wins.
const TAXONOMY: &[TaxonomyRule] = &[
    TaxonomyRule {
        kind: ErrorKind::HeaderMismatch,
        needles: &[
            "header",
            "column mismatch",
            "missing column",
            "unexpected column",
            "expected columns",
        ],
        tokens: &[],
        message: "The file's column headers do not match the expected template for its category. \
                  Check that the correct report layout was exported.",
    },
    TaxonomyRule {
        kind: ErrorKind::EmptyFile,
        needles: &["empty file", "file is empty", "no data rows", "contains no data"],
        tokens: &["0 rows", "zero rows"],
        message: "The file is empty or contains no data rows.",
    },
    TaxonomyRule {
        kind: ErrorKind::MissingWorksheet,
        needles: &["worksheet", "sheet not found", "no sheet", "missing sheet"],
        tokens: &[],
        message: "The workbook does not contain the worksheet this category expects.",
    },
    TaxonomyRule {
        kind: ErrorKind::RowLimitExceeded,
        needles: &["row limit", "too many rows", "maximum rows", "max rows"],
        tokens: &[],
        message: "The file has more rows than a single upload allows. Split it into smaller files.",
    },
    TaxonomyRule {
        kind: ErrorKind::UnsupportedFormat,
        needles: &["unsupported", "not supported", "unknown file type", "invalid file type"],
        tokens: &[],
        message: "This file format is not supported. Upload a spreadsheet, CSV or PDF.",
    },
    TaxonomyRule {
        kind: ErrorKind::PasswordProtected,
        needles: &["password", "encrypted"],
        tokens: &[],
        message: "The file is password protected. Remove the password and upload it again.",
    },
    TaxonomyRule {
        kind: ErrorKind::CorruptFile,
        needles: &["corrupt", "malformed", "damaged", "invalid signature", "unexpected end of"],
        tokens: &[],
        message: "The file appears to be corrupt or malformed and could not be read.",
    },
    TaxonomyRule {
        kind: ErrorKind::ArchiveExtraction,
        needles: &["zip", "archive", "extraction failed", "decompress"],
        tokens: &[],
        message: "The archive could not be extracted. Re-create it or upload its files individually.",
    },
    TaxonomyRule {
        kind: ErrorKind::ResourceExhausted,
        needles: &["out of memory", "memory limit", "heap", "resource exhausted", "resources exceeded"],
        tokens: &[],
        message: "The file was too large to process with the available resources.",
    },
    TaxonomyRule {
        kind: ErrorKind::Timeout,
        needles: &["timeout", "timed out", "deadline exceeded"],
        tokens: &[],
        message: "Processing took too long and was stopped.",
    },
    TaxonomyRule {
        kind: ErrorKind::StorageAccess,
        needles: &["storage", "bucket", "object not found", "download failed", "access denied"],
        tokens: &[],
        message: "The uploaded file could not be read from storage.",
    },
    TaxonomyRule {
        kind: ErrorKind::Database,
        needles: &["database", "sql", "duplicate key", "constraint", "deadlock"],
        tokens: &[],
        message: "The extracted data could not be saved.",
    },
    TaxonomyRule {
        kind: ErrorKind::NetDmrFormat,
        needles: &["netdmr", "net dmr", "edmr"],
        tokens: &[],
        message: "The file looks like a NetDMR export but its layout was not recognised. \
                  Export it again using the standard NetDMR report format.",
    },
    TaxonomyRule {
        kind: ErrorKind::UnmappedParameterCode,
        needles: &["parameter code", "unmapped parameter", "unknown parameter"],
        tokens: &[],
        message: "The file contains a parameter code that is not mapped to a known parameter.",
    },
    TaxonomyRule {
        kind: ErrorKind::PermitNotFound,
        needles: &["permit not found", "no matching permit", "unknown permit"],
        tokens: &[],
        message: "No permit matches the permit number in this file. Create the permit first.",
    },
    TaxonomyRule {
        kind: ErrorKind::OutfallNotFound,
        needles: &["outfall not found", "no matching outfall", "unknown outfall"],
        tokens: &[],
        message: "An outfall referenced in this file does not exist on its permit.",
    },
];

const RETRYABLE_NEEDLES: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection",
    "transient",
    "rate limit",
    "rate-limit",
    "too many requests",
    "temporarily unavailable",
    "econnreset",
];

/// HTTP statuses worth retrying. Matched as whole numbers so permit and
/// parameter codes that happen to contain these digits do not count.
const RETRYABLE_STATUS_CODES: &[&str] = &["429", "502", "503", "504"];

/// A classified failure: what to show, what happened, and whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// User-facing message.
    pub message: String,
    /// Raw technical text, truncated to [`MAX_DETAIL_CHARS`].
    pub detail: String,
    pub retryable: bool,
}

impl ClassifiedError {
    /// Classifies `raw` and judges its retryability.
    pub fn from_raw(raw: &str) -> Self {
        let (kind, message) = classify(raw);
        Self {
            kind,
            message,
            detail: truncate_detail(raw),
            retryable: is_retryable_error(raw),
        }
    }

    /// Lines suitable for a persisted error log.
    pub fn log_lines(&self) -> Vec<String> {
        if self.kind == ErrorKind::Unclassified {
            vec![self.message.clone()]
        } else {
            vec![self.message.clone(), format!("Details: {}", self.detail)]
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Classifies a raw failure message.
pub fn classify_error(raw: &str) -> ClassifiedError {
    ClassifiedError::from_raw(raw)
}

/// Returns only the user-facing message for a raw failure.
pub fn user_message(raw: &str) -> String {
    classify(raw).1
}

/// Whether the failure looks transient enough to retry unchanged.
pub fn is_retryable_error(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    RETRYABLE_NEEDLES.iter().any(|needle| lower.contains(needle))
        || RETRYABLE_STATUS_CODES
            .iter()
            .any(|code| contains_token(&lower, code))
}

/// Cuts `raw` to [`MAX_DETAIL_CHARS`] characters and appends the marker when cut.
pub fn truncate_detail(raw: &str) -> String {
    match raw.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((byte_idx, _)) => format!("{}{}", &raw[..byte_idx], TRUNCATION_MARKER),
        None => raw.to_string(),
    }
}

fn classify(raw: &str) -> (ErrorKind, String) {
    let lower = raw.to_lowercase();
    TAXONOMY
        .iter()
        .find(|rule| {
            rule.needles.iter().any(|needle| lower.contains(needle))
                || rule.tokens.iter().any(|token| contains_token(&lower, token))
        })
        .map(|rule| (rule.kind, squash_whitespace(rule.message)))
        .unwrap_or_else(|| (ErrorKind::Unclassified, truncate_detail(raw)))
}

/// Whether `needle` occurs in `haystack` with no letter or digit directly
/// before or after it.
fn contains_token(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// The message literals use line continuations, which keep leading spaces.
fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
