//! Server-side validation of staged data
//!
//! Validation rules live in the database as opaque routines. A [`Validator`]
//! only invokes the routine and translates its answer into a
//! [`ValidationOutcome`]; it never reads the staging table itself.
//!
//! Two invocation protocols are supported, chosen per entity in configuration:
//! - [`ValidationProtocol::Procedure`]: side-effecting call that raises a
//!   database error when the data is rejected
//! - [`ValidationProtocol::Function`]: value-returning call where a sentinel
//!   code means the data is rejected

mod error;
mod routine;

pub use error::ValidationError;
pub use routine::{FunctionValidator, ProcedureValidator, Validator, validator_for};

use serde::{Deserialize, Serialize};

/// Failure sentinel returned by function-style routines unless configured otherwise
pub const DEFAULT_FAILURE_CODE: i64 = -1;

fn default_failure_code() -> i64 {
    DEFAULT_FAILURE_CODE
}

/// How a validation routine is invoked and how its answer is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ValidationProtocol {
    /// Side-effecting call; a raised error means the data is rejected
    Procedure,
    /// Value-returning call; `failure_code` (or NULL) means the data is rejected
    Function {
        #[serde(default = "default_failure_code")]
        failure_code: i64,
    },
}

impl Default for ValidationProtocol {
    fn default() -> Self {
        ValidationProtocol::Function {
            failure_code: DEFAULT_FAILURE_CODE,
        }
    }
}

impl ValidationProtocol {
    /// Protocol name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ValidationProtocol::Procedure => "procedure",
            ValidationProtocol::Function { .. } => "function",
        }
    }
}

/// Answer of one validation routine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Pass,
    Fail { message: Option<String> },
}

impl ValidationOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationOutcome::Pass)
    }

    /// Turn a failing outcome into [`ValidationError::RulesViolated`]
    pub fn into_result(self, routine: impl ToString) -> Result<(), ValidationError> {
        match self {
            ValidationOutcome::Pass => Ok(()),
            ValidationOutcome::Fail { message } => Err(ValidationError::RulesViolated {
                routine: routine.to_string(),
                diagnostic: message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_into_result() {
        assert!(ValidationOutcome::Pass.into_result("r").is_ok());

        let err = ValidationOutcome::Fail {
            message: Some("duplicate id".to_string()),
        }
        .into_result("clients_validation_procedure")
        .unwrap_err();
        assert_eq!(err.diagnostic(), Some("duplicate id"));
    }

    #[test]
    fn test_protocol_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            protocol: ValidationProtocol,
        }

        let holder: Holder = toml::from_str("protocol = { type = \"procedure\" }").unwrap();
        assert_eq!(holder.protocol, ValidationProtocol::Procedure);

        let holder: Holder = toml::from_str("protocol = { type = \"function\" }").unwrap();
        assert_eq!(
            holder.protocol,
            ValidationProtocol::Function { failure_code: -1 }
        );

        let holder: Holder =
            toml::from_str("protocol = { type = \"function\", failure_code = 0 }").unwrap();
        assert_eq!(
            holder.protocol,
            ValidationProtocol::Function { failure_code: 0 }
        );
    }
}
