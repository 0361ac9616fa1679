use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The referenced record does not exist (or is soft-deleted).
    #[error("Record not found")]
    NotFound,

    /// The caller is known but may not touch this record.
    #[error("Forbidden")]
    Forbidden,

    /// The request is well-formed but not allowed, e.g. messaging yourself.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Input rejected by a store-level rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Connection lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether this is a UNIQUE/PRIMARY KEY violation reported by SQLite.
    pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        )
    }
}
