//! Error types for pipeline operations
//!
//! Every error is terminal for the run that produced it. Errors chain to the
//! underlying loader, validator or database error for debugging and offer a
//! user-friendly message for CLI output.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::DatabaseError;
use crate::staging::{InvalidIdentifier, LoadError};
use crate::validation::ValidationError;

/// Phase of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Empty the staging table
    Clear,
    /// Fill the staging table from the source
    Load,
    /// Call the validation routine
    Validate,
    /// Copy staged rows into the destination table
    Promote,
    /// Finalize the transaction
    Commit,
}

impl Phase {
    /// Get phase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Load => "load",
            Self::Validate => "validate",
            Self::Promote => "promote",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors in the pipeline configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or does not match the expected shape
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Entity name that is not one of the known kinds
    #[error("Unknown entity: {0} (expected clients, employees, projects or month-work)")]
    UnknownEntity(String),

    /// A table or routine name is not a plain SQL identifier
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// An entity's settings are inconsistent
    #[error("Invalid settings for {entity}: {reason}")]
    Invalid { entity: String, reason: String },
}

impl ConfigError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Io { path, .. } => format!(
                "{self}\n\nHint: Check that {} exists and is readable.",
                path.display()
            ),
            ConfigError::Parse { .. } => {
                format!("{self}\n\nHint: Check your pipeline configuration file.")
            }
            ConfigError::UnknownEntity(_) => self.to_string(),
            ConfigError::InvalidIdentifier(_) => format!(
                "{self}\n\nHint: Table and routine names must be unquoted [schema.]name identifiers."
            ),
            ConfigError::Invalid { .. } => {
                format!("{self}\n\nHint: Check your pipeline configuration file.")
            }
        }
    }
}

/// Errors that end a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The staging table could not be emptied, or its transaction not finalized
    #[error("Clearing staging table failed: {0}")]
    ClearFailed(#[source] LoadError),

    /// The source could not be staged, or the load transaction not opened
    #[error("Load failed: {0}")]
    LoadFailed(#[source] LoadError),

    /// The validation routine could not be called or rejected the data
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Copying validated rows into the destination table failed
    #[error("Promotion into {destination} failed: {source}")]
    PromotionFailed {
        destination: String,
        #[source]
        source: DatabaseError,
    },

    /// The final commit failed
    #[error("Commit failed: {0}")]
    CommitFailed(#[source] DatabaseError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Phase the run was in when it failed, if the run had started
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PipelineError::Config(_) => None,
            PipelineError::ClearFailed(_) => Some(Phase::Clear),
            PipelineError::LoadFailed(_) => Some(Phase::Load),
            PipelineError::ValidationFailed(_) => Some(Phase::Validate),
            PipelineError::PromotionFailed { .. } => Some(Phase::Promote),
            PipelineError::CommitFailed(_) => Some(Phase::Commit),
        }
    }

    /// Stable short name of the underlying error kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "Config",
            PipelineError::ClearFailed(_) => "ClearFailed",
            PipelineError::LoadFailed(e) => e.kind(),
            PipelineError::ValidationFailed(e) => e.kind(),
            PipelineError::PromotionFailed { .. } => "PromotionFailed",
            PipelineError::CommitFailed(_) => "CommitFailed",
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config(e) => e.user_message(),
            PipelineError::ClearFailed(e) => format!(
                "Could not clear the staging table: {e}\n\n\
                Hint: The staging table must exist before the first run."
            ),
            PipelineError::LoadFailed(e) => e.user_message(),
            PipelineError::ValidationFailed(e) => e.user_message(),
            PipelineError::PromotionFailed { destination, source } => format!(
                "Validated rows could not be copied into {destination}: {source}\n\n\
                Hint: Check that the destination table has the columns of the data file."
            ),
            PipelineError::CommitFailed(_) => format!(
                "{self}\n\nHint: Check the database connection; no data was committed."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_and_kind() {
        let err = PipelineError::LoadFailed(LoadError::SourceUnreadable {
            path: "data/clients.csv".to_string(),
            reason: "No such file or directory".to_string(),
        });
        assert_eq!(err.phase(), Some(Phase::Load));
        assert_eq!(err.kind(), "SourceUnreadable");
        assert!(err.to_string().contains("data/clients.csv"));

        let err: PipelineError = ValidationError::RulesViolated {
            routine: "clients_validation_procedure".to_string(),
            diagnostic: Some("duplicate id".to_string()),
        }
        .into();
        assert_eq!(err.phase(), Some(Phase::Validate));
        assert_eq!(err.kind(), "RulesViolated");
        assert!(err.user_message().contains("duplicate id"));

        let err = PipelineError::CommitFailed(DatabaseError::Transaction("gone".to_string()));
        assert_eq!(err.phase(), Some(Phase::Commit));
        assert!(err.user_message().contains("Hint:"));
    }

    #[test]
    fn test_config_error_has_no_phase() {
        let err: PipelineError = ConfigError::UnknownEntity("invoices".to_string()).into();
        assert_eq!(err.phase(), None);
        assert_eq!(err.kind(), "Config");
        assert!(err.to_string().contains("invoices"));
    }

    #[test]
    fn test_source_chain() {
        let err = PipelineError::PromotionFailed {
            destination: "clients".to_string(),
            source: DatabaseError::Connection("refused".to_string()),
        };
        assert_eq!(err.phase(), Some(Phase::Promote));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("refused"));
        assert_eq!(Phase::Clear.to_string(), "clear");
    }
}
