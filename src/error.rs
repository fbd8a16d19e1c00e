//! Error types for daysheet
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, unknown employee or sheet, malformed cell)
//! - 3: Blocked by policy (back-dated edit, unresolved store conflict)
//! - 4: Operation failed (I/O, lock timeout, store failure)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the daysheet CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for daysheet operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Employee '{0}' not found in any sheet")]
    EmployeeNotFound(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed cell: {0}")]
    MalformedCell(String),

    // Policy blocks (exit code 3)
    #[error("Column '{label}' is not the latest day ('{latest}'); back-dated edits are disabled")]
    BackdatedEdit { label: String, latest: String },

    #[error("Store conflict: {0}")]
    Conflict(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        // Unique/check violations that survive an ON CONFLICT clause are
        // surfaced as conflicts, never swallowed.
        if let rusqlite::Error::SqliteFailure(code, ref message) = err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return Error::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                );
            }
        }
        Error::Sqlite(err)
    }
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::EmployeeNotFound(_)
            | Error::SheetNotFound(_)
            | Error::NotFound(_)
            | Error::MalformedCell(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::BackdatedEdit { .. } | Error::Conflict(_) => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Sqlite(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable category for JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::InvalidConfig(_) => "invalid_config",
            Error::EmployeeNotFound(_) | Error::SheetNotFound(_) | Error::NotFound(_) => {
                "not_found"
            }
            Error::MalformedCell(_) => "malformed_cell",
            Error::BackdatedEdit { .. } => "backdated_edit",
            Error::Conflict(_) => "conflict",
            _ => "io",
        }
    }
}

/// Result type alias for daysheet operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_categories() {
        assert_eq!(
            Error::Validation("empty".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::BackdatedEdit {
                label: "Mon 01-Jan".into(),
                latest: "Tue 02-Jan".into()
            }
            .exit_code(),
            exit_codes::POLICY_BLOCKED
        );
        assert_eq!(
            Error::LockFailed(PathBuf::from("x.lock")).exit_code(),
            exit_codes::OPERATION_FAILED
        );
    }

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed".to_string()),
        );
        let mapped: Error = err.into();
        assert!(matches!(mapped, Error::Conflict(_)));
        assert_eq!(mapped.kind(), "conflict");
    }
}
