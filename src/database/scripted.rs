//! Scripted in-memory connection for unit tests
//!
//! Records every statement it receives and answers from a script: statements
//! containing a configured fragment fail with the configured error (every
//! time, or only on the n-th matching statement), scalar queries containing a
//! configured fragment return the configured value.

use std::cell::RefCell;

use super::{Database, DatabaseError, Dialect};
use crate::staging::Identifier;

struct Failure {
    fragment: String,
    /// 1-based occurrence to fail; `None` fails every match
    nth: Option<usize>,
    error: DatabaseError,
}

pub(crate) struct ScriptedDatabase {
    dialect: Dialect,
    tables: Vec<String>,
    failures: Vec<Failure>,
    answers: Vec<(String, Option<i64>)>,
    log: RefCell<Vec<String>>,
}

impl ScriptedDatabase {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
            failures: Vec::new(),
            answers: Vec::new(),
            log: RefCell::new(Vec::new()),
        }
    }

    /// Report `table` as existing
    pub(crate) fn with_table(mut self, table: &str) -> Self {
        self.tables.push(table.to_string());
        self
    }

    /// Fail every statement containing `fragment`
    pub(crate) fn fail_on(mut self, fragment: &str, error: DatabaseError) -> Self {
        self.failures.push(Failure {
            fragment: fragment.to_string(),
            nth: None,
            error,
        });
        self
    }

    /// Fail only the `nth` (1-based) statement containing `fragment`
    pub(crate) fn fail_on_nth(mut self, fragment: &str, nth: usize, error: DatabaseError) -> Self {
        self.failures.push(Failure {
            fragment: fragment.to_string(),
            nth: Some(nth),
            error,
        });
        self
    }

    /// Answer scalar queries containing `fragment` with `value`
    pub(crate) fn answer(mut self, fragment: &str, value: Option<i64>) -> Self {
        self.answers.push((fragment.to_string(), value));
        self
    }

    /// Every statement received so far, in order
    pub(crate) fn statements(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Position of the first logged statement starting with `prefix`
    pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
        self.log.borrow().iter().position(|s| s.starts_with(prefix))
    }

    fn run(&self, sql: &str) -> Result<(), DatabaseError> {
        self.log.borrow_mut().push(sql.to_string());
        let log = self.log.borrow();
        let failure = self.failures.iter().find(|f| {
            sql.contains(&f.fragment)
                && f.nth.is_none_or(|nth| {
                    log.iter().filter(|s| s.contains(&f.fragment)).count() == nth
                })
        });
        match failure {
            Some(f) => Err(f.error.clone()),
            None => Ok(()),
        }
    }
}

impl Database for ScriptedDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.run("BEGIN")
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.run("COMMIT")
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.run("ROLLBACK")
    }

    fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        self.run(sql)?;
        Ok(0)
    }

    fn execute_with(&self, sql: &str, params: &[Option<&str>]) -> Result<u64, DatabaseError> {
        self.run(sql)?;
        Ok(params.len() as u64)
    }

    fn query_i64(&self, sql: &str) -> Result<Option<i64>, DatabaseError> {
        self.run(sql)?;
        Ok(self
            .answers
            .iter()
            .find(|(fragment, _)| sql.contains(fragment))
            .and_then(|(_, value)| *value))
    }

    fn table_exists(&self, table: &Identifier) -> Result<bool, DatabaseError> {
        Ok(self.tables.iter().any(|t| t == table.as_str()))
    }
}
