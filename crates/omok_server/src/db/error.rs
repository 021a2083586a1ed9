//! Database error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Broad category of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum DbErrorKind {
    /// Could not open the database file.
    Connection,
    /// Schema migration failed.
    Migration,
    /// A query or statement failed.
    Query,
    /// A stored row does not map onto a domain value.
    CorruptRow,
}

/// Database error with location tracking.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
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
    /// Creates a new database error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
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
        Self::new(DbErrorKind::Query, err.to_string())
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(DbErrorKind::Connection, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_names() {
        let names: Vec<String> = DbErrorKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["connection", "migration", "query", "corrupt_row"]);
    }

    #[test]
    fn test_new_records_caller() {
        let err = DbError::new(DbErrorKind::Query, "boom");
        assert_eq!(err.file, file!());
        assert!(err.to_string().starts_with("Database query error: boom"));
    }
}
