//! Error types for the tollgate-store crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`].
//! Callers that only care about the broad failure class should match on
//! [`StoreError::kind`] instead of the individual variants.

use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationError;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the account store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is empty or the email is malformed. Raised before
    /// the database is touched.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The username is already registered.
    #[error("username already taken: {username}")]
    DuplicateUsername { username: String },

    /// No account matches the supplied credentials.
    ///
    /// Deliberately carries no detail: an unknown username and a wrong
    /// password are indistinguishable.
    #[error("no account matches the supplied credentials")]
    NotFound,

    /// The database file could not be created, opened, or prepared.
    #[error("storage unavailable at {}: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The system random source failed while salting a password.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Broad classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    DuplicateUsername,
    NotFound,
    StorageUnavailable,
    StorageError,
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::DuplicateUsername { .. } => ErrorKind::DuplicateUsername,
            Self::NotFound => ErrorKind::NotFound,
            Self::StorageUnavailable { .. } | Self::Config(_) => ErrorKind::StorageUnavailable,
            Self::Sqlite(_) | Self::Migration { .. } | Self::Crypto(_) | Self::TaskJoin(_) => {
                ErrorKind::StorageError
            }
        }
    }
}
