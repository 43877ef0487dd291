//! Error types for database connections

use thiserror::Error;

/// Errors reported by a [`Database`](super::Database) connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// The connection could not be opened or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected or failed a statement
    #[error("Database error: {0}")]
    Query(String),

    /// Transaction control (BEGIN/COMMIT/ROLLBACK) failed
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl DatabaseError {
    /// True when the failure came from the link rather than from the server
    pub fn is_connection(&self) -> bool {
        matches!(self, DatabaseError::Connection(_))
    }

    /// Server-side diagnostic message, without the error category prefix
    pub fn message(&self) -> &str {
        match self {
            DatabaseError::Connection(msg)
            | DatabaseError::Query(msg)
            | DatabaseError::Transaction(msg) => msg,
        }
    }
}

#[cfg(feature = "duckdb-backend")]
impl From<duckdb::Error> for DatabaseError {
    fn from(err: duckdb::Error) -> Self {
        DatabaseError::Query(err.to_string())
    }
}

#[cfg(feature = "postgres-backend")]
impl From<tokio_postgres::Error> for DatabaseError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_error) = err.as_db_error() {
            DatabaseError::Query(db_error.message().to_string())
        } else if err.is_closed() || is_io_failure(&err) {
            DatabaseError::Connection(err.to_string())
        } else {
            DatabaseError::Query(err.to_string())
        }
    }
}

#[cfg(feature = "postgres-backend")]
fn is_io_failure(err: &tokio_postgres::Error) -> bool {
    std::error::Error::source(err)
        .map(|source| source.is::<std::io::Error>())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_strips_prefix() {
        let err = DatabaseError::Query("duplicate id".to_string());
        assert_eq!(err.message(), "duplicate id");
        assert_eq!(err.to_string(), "Database error: duplicate id");
        assert!(!err.is_connection());

        let err = DatabaseError::Connection("reset by peer".to_string());
        assert!(err.is_connection());
    }
}
