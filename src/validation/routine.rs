//! Validators for the two routine invocation protocols

use tracing::{debug, warn};

use super::{ValidationError, ValidationOutcome, ValidationProtocol};
use crate::database::{Database, DatabaseError};
use crate::staging::Identifier;

/// Invokes one server-side validation routine and reports its verdict
///
/// Errors raised by the server while the routine runs are a verdict
/// ([`ValidationOutcome::Fail`]); only a failed link is a [`ValidationError`].
pub trait Validator {
    /// Routine this validator calls
    fn routine(&self) -> &Identifier;

    /// Call the routine once against the current staging contents
    fn validate(&self, db: &dyn Database) -> Result<ValidationOutcome, ValidationError>;
}

/// Build the validator for a configured protocol
pub fn validator_for(protocol: ValidationProtocol, routine: Identifier) -> Box<dyn Validator> {
    match protocol {
        ValidationProtocol::Procedure => Box::new(ProcedureValidator::new(routine)),
        ValidationProtocol::Function { failure_code } => {
            Box::new(FunctionValidator::new(routine).with_failure_code(failure_code))
        }
    }
}

fn raised(routine: &Identifier, err: DatabaseError) -> Result<ValidationOutcome, ValidationError> {
    if err.is_connection() {
        return Err(ValidationError::CallFailed {
            routine: routine.to_string(),
            source: err,
        });
    }
    warn!(routine = %routine, error = %err, "Validation routine raised an error");
    Ok(ValidationOutcome::Fail {
        message: Some(err.message().to_string()),
    })
}

/// Side-effecting routine that raises an error to reject the data
#[derive(Debug, Clone)]
pub struct ProcedureValidator {
    routine: Identifier,
}

impl ProcedureValidator {
    pub fn new(routine: Identifier) -> Self {
        Self { routine }
    }
}

impl Validator for ProcedureValidator {
    fn routine(&self) -> &Identifier {
        &self.routine
    }

    fn validate(&self, db: &dyn Database) -> Result<ValidationOutcome, ValidationError> {
        debug!(routine = %self.routine, "Calling validation procedure");
        match db.call_procedure(&self.routine) {
            Ok(()) => Ok(ValidationOutcome::Pass),
            Err(e) => raised(&self.routine, e),
        }
    }
}

/// Value-returning routine; a sentinel code or NULL rejects the data
#[derive(Debug, Clone)]
pub struct FunctionValidator {
    routine: Identifier,
    failure_code: i64,
}

impl FunctionValidator {
    pub fn new(routine: Identifier) -> Self {
        Self {
            routine,
            failure_code: super::DEFAULT_FAILURE_CODE,
        }
    }

    /// Use a different failure sentinel
    pub fn with_failure_code(mut self, failure_code: i64) -> Self {
        self.failure_code = failure_code;
        self
    }

    pub fn failure_code(&self) -> i64 {
        self.failure_code
    }
}

impl Validator for FunctionValidator {
    fn routine(&self) -> &Identifier {
        &self.routine
    }

    fn validate(&self, db: &dyn Database) -> Result<ValidationOutcome, ValidationError> {
        let sql = db.dialect().function_call(&self.routine);
        debug!(routine = %self.routine, "Calling validation function");

        match db.query_i64(&sql) {
            Ok(Some(code)) if code == self.failure_code => Ok(ValidationOutcome::Fail {
                message: Some(format!("{} returned failure code {code}", self.routine)),
            }),
            Ok(Some(code)) => {
                debug!(routine = %self.routine, code, "Validation function passed");
                Ok(ValidationOutcome::Pass)
            }
            Ok(None) => Ok(ValidationOutcome::Fail {
                message: Some(format!("{} returned no value", self.routine)),
            }),
            Err(e) => raised(&self.routine, e),
        }
    }
}
