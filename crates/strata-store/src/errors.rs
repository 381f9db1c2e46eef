//! Error handling for strata-store
//!
//! Wraps strata-core StrataError with storage-specific constructors

use rusqlite::ErrorCode;
use strata_core::errors::StrataError;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Create a storage error from a rusqlite::Error
pub fn from_rusqlite(op: &str, err: rusqlite::Error) -> StrataError {
    StrataError::Storage {
        op: op.to_string(),
        message: err.to_string(),
    }
}

/// Create an IO error
pub fn io_error(op: &str, err: std::io::Error) -> StrataError {
    StrataError::Io {
        op: op.to_string(),
        message: err.to_string(),
    }
}

/// Create a migration script failure
pub fn migration_error(migration: &str, err: rusqlite::Error) -> StrataError {
    StrataError::Migration {
        migration: migration.to_string(),
        reason: err.to_string(),
    }
}

/// Create a concurrency conflict for an append against `stream_id`
pub fn concurrency_conflict(stream_id: &str, expected_version: u64) -> StrataError {
    StrataError::ConcurrencyConflict {
        stream_id: stream_id.to_string(),
        expected_version,
    }
}

/// Create an invalid input error
pub fn invalid_input(reason: impl Into<String>) -> StrataError {
    StrataError::InvalidInput {
        reason: reason.into(),
    }
}

/// True when `err` is a UNIQUE/PRIMARY KEY constraint violation
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Convert a stored integer column into an unsigned counter
pub fn to_u64(op: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StrataError::Storage {
        op: op.to_string(),
        message: format!("negative value {} in unsigned column", value),
    })
}

/// Convert an unsigned counter into an SQLite integer
pub fn to_i64(op: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StrataError::InvalidInput {
        reason: format!("{}: value {} exceeds storage range", op, value),
    })
}
