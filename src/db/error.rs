//! Database error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Broad category of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DbErrorKind {
    /// Connection, query or migration failure.
    #[display("query")]
    Query,
    /// Optimistic-concurrency check failed; the row changed since it was read.
    #[display("conflict")]
    Conflict,
    /// Stored data could not be decoded into domain types.
    #[display("corrupt")]
    Corrupt,
}

/// Database error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Database {} error: {} at {}:{}", kind, message, file, line)]
pub struct DbError {
    /// Failure category.
    pub kind: DbErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DbError {
    /// Creates a new query error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Query, message)
    }

    /// Creates a concurrency conflict error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Conflict, message)
    }

    /// Creates an error for stored data that fails to decode.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Corrupt, message)
    }

    /// True if the error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        self.kind == DbErrorKind::Conflict
    }

    #[track_caller]
    fn with_kind(kind: DbErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::new(format!("Diesel error: {}", err))
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}

impl From<serde_json::Error> for DbError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::corrupt(format!("Board encoding error: {}", err))
    }
}
