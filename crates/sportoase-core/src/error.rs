//! Core error types for sportoase-core.
//!
//! Business-rule rejections are not errors: they are returned as
//! [`Rejection`](crate::booking::Rejection) values. The types here cover
//! input that cannot be represented, storage faults and configuration
//! problems.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sportoase-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The acting identity lacks the role required for the operation
    #[error("Permission denied: {action} requires the admin role")]
    PermissionDenied { action: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The slot capacity trigger rejected a student row
    #[error("Slot capacity exceeded")]
    CapacityConflict,

    /// The per-slot student uniqueness index rejected a student row
    #[error("Student already booked in this slot")]
    DoubleBookingConflict,

    /// A stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid date range
    #[error("Invalid date range: end ({end}) is before start ({start})")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

const CAPACITY_TRIGGER_MESSAGE: &str = "slot capacity exceeded";
const STUDENT_UNIQUE_INDEX: &str = "reservation_students.slot_date";

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let msg = msg.as_deref().unwrap_or_default();
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && msg.contains(CAPACITY_TRIGGER_MESSAGE)
                {
                    DatabaseError::CapacityConflict
                } else if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && msg.contains(STUDENT_UNIQUE_INDEX)
                {
                    DatabaseError::DoubleBookingConflict
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
