//! Error types for validation routine calls

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors that end a run during the validation phase
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The routine could not be invoked because the connection failed
    #[error("Call to validation routine {routine} failed: {source}")]
    CallFailed {
        routine: String,
        #[source]
        source: DatabaseError,
    },

    /// The routine reported that the staged data breaks its rules
    #[error(
        "Validation routine {routine} rejected the staged data: {}",
        .diagnostic.as_deref().unwrap_or("no diagnostic")
    )]
    RulesViolated {
        routine: String,
        diagnostic: Option<String>,
    },
}

impl ValidationError {
    /// Stable short name of the error kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::CallFailed { .. } => "CallFailed",
            ValidationError::RulesViolated { .. } => "RulesViolated",
        }
    }

    /// Diagnostic reported by the routine, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ValidationError::RulesViolated { diagnostic, .. } => diagnostic.as_deref(),
            ValidationError::CallFailed { .. } => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::CallFailed { routine, source } => {
                format!(
                    "Could not call validation routine {routine}: {source}\n\n\
                    Hint: Check the database connection and that the routine exists."
                )
            }
            ValidationError::RulesViolated {
                routine,
                diagnostic,
            } => match diagnostic {
                Some(diagnostic) => format!(
                    "The data was rejected by {routine}: {diagnostic}\n\n\
                    Hint: Fix the reported records in the data file and run again."
                ),
                None => format!(
                    "The data was rejected by {routine}.\n\n\
                    Hint: Check the routine's log table for details."
                ),
            },
        }
    }
}
