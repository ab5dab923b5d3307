// Error types for store and query operations

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by [`crate::Store`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller-supplied data violates a model invariant.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced id does not exist (already deleted or never created).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The backing files could not be read or durably written.
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Validation and not-found errors can be fixed by the caller and retried;
    /// persistence errors need attention from the user.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

/// Storage-level failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store at {0} is locked by another process")]
    Locked(String),

    #[error("unsupported store version {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: u32 },

    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(value.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Persistence(value.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Persistence(value.into())
    }
}
