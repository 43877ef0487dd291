//! Connection handles for the staging pipeline
//!
//! The pipeline only needs a small, blocking surface from a database: explicit
//! transaction control, plain and parameterized statements, and a scalar query.
//! [`Database`] captures that surface; each backend is feature-gated.
//!
//! - `duckdb-backend`: embedded DuckDB ([`DuckDbConnection`])
//! - `postgres-backend`: PostgreSQL over `tokio-postgres` ([`PostgresConnection`])

mod config;
#[cfg(feature = "duckdb-backend")]
mod duckdb_backend;
mod error;
#[cfg(feature = "postgres-backend")]
mod postgres_backend;
#[cfg(test)]
pub(crate) mod scripted;

pub use config::ConnectionConfig;
#[cfg(feature = "duckdb-backend")]
pub use duckdb_backend::DuckDbConnection;
pub use error::DatabaseError;
#[cfg(feature = "postgres-backend")]
pub use postgres_backend::PostgresConnection;

use crate::staging::Identifier;

/// SQL dialect differences the pipeline has to care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// DuckDB: `?` placeholders, no stored procedures
    DuckDb,
    /// PostgreSQL: `$n` placeholders, `CALL` for procedures
    Postgres,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::DuckDb => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
        }
    }

    /// Maximum number of bind parameters in a single statement
    pub fn max_params(&self) -> usize {
        match self {
            // Wire protocol limit (Int16 parameter count)
            Dialect::Postgres => 65_535,
            Dialect::DuckDb => 65_535,
        }
    }

    /// Statement invoking a side-effecting validation routine
    ///
    /// DuckDB has no stored procedures, so the routine is a macro evaluated for
    /// its side effect of raising `error(...)` on failure.
    pub fn procedure_call(&self, routine: &Identifier) -> String {
        match self {
            Dialect::Postgres => format!("CALL {routine}()"),
            Dialect::DuckDb => format!("SELECT {routine}()"),
        }
    }

    /// Query invoking a value-returning validation routine
    pub fn function_call(&self, routine: &Identifier) -> String {
        format!("SELECT CAST({routine}() AS BIGINT)")
    }

    /// Human-readable dialect name
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::DuckDb => "duckdb",
            Dialect::Postgres => "postgres",
        }
    }
}

/// A transactional connection handed to the staging pipeline
///
/// Implementations block the calling thread until the server answers. Values
/// are passed as type-erased text (`None` is SQL NULL) and coerced by the
/// server to the target column type.
pub trait Database {
    /// SQL dialect spoken by this connection
    fn dialect(&self) -> Dialect;

    /// Open a transaction
    fn begin(&self) -> Result<(), DatabaseError>;

    /// Commit the open transaction
    fn commit(&self) -> Result<(), DatabaseError>;

    /// Roll back the open transaction
    fn rollback(&self) -> Result<(), DatabaseError>;

    /// Execute a single statement without parameters, returning affected rows
    fn execute(&self, sql: &str) -> Result<u64, DatabaseError>;

    /// Execute a single parameterized statement, returning affected rows
    fn execute_with(&self, sql: &str, params: &[Option<&str>]) -> Result<u64, DatabaseError>;

    /// First column of the first row, if any
    fn query_i64(&self, sql: &str) -> Result<Option<i64>, DatabaseError>;

    /// Check whether a table exists
    fn table_exists(&self, table: &Identifier) -> Result<bool, DatabaseError>;

    /// Invoke a side-effecting routine, discarding any result
    fn call_procedure(&self, routine: &Identifier) -> Result<(), DatabaseError> {
        self.execute(&self.dialect().procedure_call(routine))?;
        Ok(())
    }

    /// Number of rows currently visible in `table`
    fn row_count(&self, table: &Identifier) -> Result<i64, DatabaseError> {
        let count = self.query_i64(&format!("SELECT COUNT(*) FROM {table}"))?;
        Ok(count.unwrap_or(0))
    }
}

impl<D: Database + ?Sized> Database for &D {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        (**self).begin()
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        (**self).rollback()
    }

    fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        (**self).execute(sql)
    }

    fn execute_with(&self, sql: &str, params: &[Option<&str>]) -> Result<u64, DatabaseError> {
        (**self).execute_with(sql, params)
    }

    fn query_i64(&self, sql: &str) -> Result<Option<i64>, DatabaseError> {
        (**self).query_i64(sql)
    }

    fn table_exists(&self, table: &Identifier) -> Result<bool, DatabaseError> {
        (**self).table_exists(table)
    }

    fn call_procedure(&self, routine: &Identifier) -> Result<(), DatabaseError> {
        (**self).call_procedure(routine)
    }
}

/// Placeholder handle for runs that must not reach a database (dry runs)
///
/// Every operation fails with [`DatabaseError::Connection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl Disconnected {
    fn refuse<T>(&self) -> Result<T, DatabaseError> {
        Err(DatabaseError::Connection(
            "no database connection (dry run)".to_string(),
        ))
    }
}

impl Database for Disconnected {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.refuse()
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.refuse()
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.refuse()
    }

    fn execute(&self, _sql: &str) -> Result<u64, DatabaseError> {
        self.refuse()
    }

    fn execute_with(&self, _sql: &str, _params: &[Option<&str>]) -> Result<u64, DatabaseError> {
        self.refuse()
    }

    fn query_i64(&self, _sql: &str) -> Result<Option<i64>, DatabaseError> {
        self.refuse()
    }

    fn table_exists(&self, _table: &Identifier) -> Result<bool, DatabaseError> {
        self.refuse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::DuckDb.placeholder(3), "?");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }

    #[test]
    fn test_routine_calls() {
        let routine = Identifier::parse("clients_validation_procedure").unwrap();
        assert_eq!(
            Dialect::Postgres.procedure_call(&routine),
            "CALL clients_validation_procedure()"
        );
        assert_eq!(
            Dialect::DuckDb.procedure_call(&routine),
            "SELECT clients_validation_procedure()"
        );
        assert_eq!(
            Dialect::Postgres.function_call(&routine),
            "SELECT CAST(clients_validation_procedure() AS BIGINT)"
        );
        assert_eq!(Dialect::DuckDb.name(), "duckdb");
        assert_eq!(Dialect::Postgres.name(), "postgres");
    }

    #[test]
    fn test_disconnected_refuses_everything() {
        let db = Disconnected;
        assert!(db.begin().unwrap_err().is_connection());
        assert!(db.execute("DELETE FROM t").is_err());
        let table = Identifier::parse("t").unwrap();
        assert!(db.row_count(&table).is_err());
    }
}
