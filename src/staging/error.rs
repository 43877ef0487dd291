//! Error types for staging operations

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors that can occur while clearing or loading a staging table
#[derive(Error, Debug)]
pub enum LoadError {
    /// The tabular source could not be opened or parsed
    #[error("Source not readable: {path} - {reason}")]
    SourceUnreadable { path: String, reason: String },

    /// A record does not match the column set discovered from the source
    #[error("Schema mismatch at record {record}: expected {expected} columns, found {found}")]
    SchemaMismatch {
        record: usize,
        expected: usize,
        found: usize,
    },

    /// A statement against the staging table failed
    #[error("Write to {table} failed: {source}")]
    WriteFailed {
        table: String,
        #[source]
        source: DatabaseError,
    },
}

impl LoadError {
    pub(crate) fn write(table: impl ToString, source: DatabaseError) -> Self {
        LoadError::WriteFailed {
            table: table.to_string(),
            source,
        }
    }

    /// Stable short name of the error kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::SourceUnreadable { .. } => "SourceUnreadable",
            LoadError::SchemaMismatch { .. } => "SchemaMismatch",
            LoadError::WriteFailed { .. } => "WriteFailed",
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoadError::SourceUnreadable { path, reason } => {
                format!(
                    "Cannot read data file: {path}\nReason: {reason}\n\n\
                    Hint: Check that the file exists and is a delimited file with a header row."
                )
            }
            LoadError::SchemaMismatch {
                record,
                expected,
                found,
            } => {
                format!(
                    "Record {record} has {found} fields but the header names {expected} columns.\n\n\
                    Hint: Check the delimiter and quoting around record {record}."
                )
            }
            LoadError::WriteFailed { table, source } => {
                format!(
                    "Writing to staging table {table} failed: {source}\n\n\
                    Hint: Check that the table exists and its columns match the file header."
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = LoadError::SourceUnreadable {
            path: "clients.csv".to_string(),
            reason: "No such file".to_string(),
        };
        assert_eq!(err.kind(), "SourceUnreadable");
        assert!(err.user_message().contains("Hint:"));

        let err = LoadError::write(
            "clients_temporary",
            DatabaseError::Query("relation does not exist".to_string()),
        );
        assert_eq!(err.kind(), "WriteFailed");
        assert!(err.to_string().contains("clients_temporary"));
        assert!(err.to_string().contains("relation does not exist"));
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = LoadError::SchemaMismatch {
            record: 7,
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch at record 7: expected 3 columns, found 2"
        );
        assert!(err.user_message().contains("record 7"));
    }
}
