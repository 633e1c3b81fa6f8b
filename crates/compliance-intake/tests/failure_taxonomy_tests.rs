//! Failure taxonomy tests: classification, retryability and truncation.

use compliance_intake::failure::{
    classify_error, is_retryable_error, truncate_detail, user_message, ErrorKind,
    MAX_DETAIL_CHARS, TRUNCATION_MARKER,
};

struct TestCase {
    raw: &'static str,
    kind: ErrorKind,
    retryable: bool,
}

const TAXONOMY_TESTS: &[TestCase] = &[
    TestCase { raw: "File is password protected", kind: ErrorKind::PasswordProtected, retryable: false },
    TestCase { raw: "connection timed out", kind: ErrorKind::Timeout, retryable: true },
    TestCase { raw: "unknown parameter code 50050", kind: ErrorKind::UnmappedParameterCode, retryable: false },
    TestCase { raw: "Expected columns: Date, Outfall, Value", kind: ErrorKind::HeaderMismatch, retryable: false },
    TestCase { raw: "The file is empty", kind: ErrorKind::EmptyFile, retryable: false },
    TestCase { raw: "Sheet not found: Results", kind: ErrorKind::MissingWorksheet, retryable: false },
    TestCase { raw: "Workbook has too many rows (250000)", kind: ErrorKind::RowLimitExceeded, retryable: false },
    TestCase { raw: "Unsupported file extension .pages", kind: ErrorKind::UnsupportedFormat, retryable: false },
    TestCase { raw: "Malformed XLSX: unexpected end of stream", kind: ErrorKind::CorruptFile, retryable: false },
    TestCase { raw: "zip extraction failed", kind: ErrorKind::ArchiveExtraction, retryable: false },
    TestCase { raw: "Out of memory while parsing", kind: ErrorKind::ResourceExhausted, retryable: false },
    TestCase { raw: "Deadline exceeded while parsing", kind: ErrorKind::Timeout, retryable: false },
    TestCase { raw: "Storage download failed: 503", kind: ErrorKind::StorageAccess, retryable: true },
    TestCase { raw: "duplicate key value violates unique constraint", kind: ErrorKind::Database, retryable: false },
    TestCase { raw: "NetDMR layout not recognised", kind: ErrorKind::NetDmrFormat, retryable: false },
    TestCase { raw: "Permit not found: KY0001234", kind: ErrorKind::PermitNotFound, retryable: false },
    TestCase { raw: "Outfall not found: 001", kind: ErrorKind::OutfallNotFound, retryable: false },
    TestCase { raw: "network unreachable", kind: ErrorKind::Unclassified, retryable: true },
    TestCase { raw: "HTTP 429 from parser", kind: ErrorKind::Unclassified, retryable: true },
    TestCase { raw: "Parser returned 0 rows", kind: ErrorKind::EmptyFile, retryable: false },
    TestCase { raw: "Row limit exceeded: file has 150000 rows", kind: ErrorKind::RowLimitExceeded, retryable: false },
    TestCase { raw: "Too many rows: maximum 100000 rows", kind: ErrorKind::RowLimitExceeded, retryable: false },
    TestCase { raw: "failed to extract data from row 5", kind: ErrorKind::Unclassified, retryable: false },
    TestCase { raw: "Permit not found: KY0042931", kind: ErrorKind::PermitNotFound, retryable: false },
    TestCase { raw: "unknown parameter code 50429", kind: ErrorKind::UnmappedParameterCode, retryable: false },
    TestCase { raw: "Storage returned 502 Bad Gateway", kind: ErrorKind::StorageAccess, retryable: true },
];

#[test]
fn test_taxonomy_table() {
    for test in TAXONOMY_TESTS {
        let classified = classify_error(test.raw);
        assert_eq!(classified.kind, test.kind, "Test '{}': wrong kind", test.raw);
        assert_eq!(
            classified.retryable, test.retryable,
            "Test '{}': wrong retryability",
            test.raw
        );
        assert_eq!(is_retryable_error(test.raw), test.retryable, "Test '{}'", test.raw);
        assert_eq!(classified.detail, test.raw, "Test '{}': short detail is kept whole", test.raw);
        assert_eq!(user_message(test.raw), classified.message, "Test '{}'", test.raw);
    }
}

#[test]
fn test_classification_is_case_insensitive() {
    assert_eq!(
        classify_error("FILE IS PASSWORD PROTECTED").kind,
        ErrorKind::PasswordProtected
    );
    assert!(is_retryable_error("CONNECTION RESET BY PEER"));
}

#[test]
fn test_password_message_text() {
    assert_eq!(
        user_message("File is password protected"),
        "The file is password protected. Remove the password and upload it again."
    );
}

#[test]
fn test_unclassified_message_is_truncated_raw_text() {
    let raw = "x".repeat(2000);
    let classified = classify_error(&raw);
    assert_eq!(classified.kind, ErrorKind::Unclassified);
    assert_eq!(classified.message.chars().count(), MAX_DETAIL_CHARS + TRUNCATION_MARKER.len());
    assert!(classified.message.ends_with(TRUNCATION_MARKER));
    assert_eq!(classified.message, classified.detail);
}

#[test]
fn test_truncation_boundaries() {
    let exact = "a".repeat(MAX_DETAIL_CHARS);
    assert_eq!(truncate_detail(&exact), exact);

    let over = "a".repeat(MAX_DETAIL_CHARS + 1);
    let cut = truncate_detail(&over);
    assert_eq!(cut, format!("{}{}", exact, TRUNCATION_MARKER));

    // Counted in characters, never split inside one.
    let wide = "é".repeat(MAX_DETAIL_CHARS + 50);
    let cut = truncate_detail(&wide);
    assert_eq!(
        cut.chars().count(),
        MAX_DETAIL_CHARS + TRUNCATION_MARKER.chars().count()
    );
}

#[test]
fn test_detail_is_truncated_for_classified_kinds() {
    let raw = format!("File is password protected: {}", "z".repeat(1000));
    let classified = classify_error(&raw);
    assert_eq!(classified.kind, ErrorKind::PasswordProtected);
    assert!(classified.detail.ends_with(TRUNCATION_MARKER));
    assert_eq!(
        classified.log_lines(),
        vec![classified.message.clone(), format!("Details: {}", classified.detail)]
    );
}
