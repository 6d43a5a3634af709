// Category 1: Error Handling Tests (error.rs)
// Tests for AppError conversions, Display and kind tags

use crate::error::{AppError, AppResult};
use std::io;

/// Test Case 1.1: Convert IO Error to AppError
#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let app_error: AppError = io_error.into();

    match app_error {
        AppError::Io(_) => {}
        other => panic!("Expected AppError::Io, got {:?}", other),
    }
}

/// Test Case 1.2: Convert Rusqlite Error to AppError
#[test]
fn test_database_error_conversion() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let rusqlite_error = conn.execute("INVALID SQL STATEMENT", []).unwrap_err();

    let app_error: AppError = rusqlite_error.into();
    assert!(matches!(app_error, AppError::Database(_)));
    assert_eq!(app_error.kind(), "internal_error");
}

/// Test Case 1.3: Convert Serde JSON Error to AppError
#[test]
fn test_serde_error_conversion() {
    let serde_error = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
    let app_error: AppError = serde_error.into();

    assert!(matches!(app_error, AppError::Serde(_)));
}

/// Test Case 1.4: NotFound names the entity and id
#[test]
fn test_not_found_display() {
    let error = AppError::not_found("Passage", 42);
    assert_eq!(error.to_string(), "Passage 42 not found");
    assert_eq!(error.kind(), "not_found");
}

/// Test Case 1.5: Validation carries its message
#[test]
fn test_validation_display() {
    let error = AppError::validation("total questions must be 40, got 39");
    assert_eq!(
        error.to_string(),
        "validation failed: total questions must be 40, got 39"
    );
    assert_eq!(error.kind(), "validation_error");
}

/// Test Case 1.6: Kind tags for the remaining variants
#[test]
fn test_error_kinds() {
    assert_eq!(AppError::Conflict("dup".into()).kind(), "conflict");
    assert_eq!(AppError::Unauthorized.kind(), "unauthorized");
    assert_eq!(
        AppError::InvariantViolation("bad tag".into()).kind(),
        "invariant_violation"
    );
    assert_eq!(
        AppError::InvalidConfig {
            key: "READING_BIND_ADDR",
            message: "bad".into()
        }
        .kind(),
        "configuration_error"
    );
    assert_eq!(AppError::Internal("x".into()).kind(), "internal_error");
}

/// Test Case 1.7: AppResult works with ?
#[test]
fn test_app_result_propagation() {
    fn inner() -> AppResult<i64> {
        Err(AppError::Conflict("question number 3 is already used in pack 1".into()))
    }
    fn outer() -> AppResult<i64> {
        let value = inner()?;
        Ok(value + 1)
    }

    let err = outer().unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

/// Test Case 1.8: Join errors become internal errors
#[tokio::test]
async fn test_join_error_conversion() {
    let handle = tokio::spawn(async { panic!("boom") });
    let join_error = handle.await.unwrap_err();

    let app_error: AppError = join_error.into();
    assert!(matches!(app_error, AppError::Internal(_)));
}
