//! Embedded DuckDB connection

use tracing::debug;

use super::{Database, DatabaseError, Dialect};
use crate::staging::Identifier;

/// DuckDB connection, file-backed or in-memory
pub struct DuckDbConnection {
    conn: duckdb::Connection,
    path: Option<String>,
}

impl DuckDbConnection {
    /// Open or create a database file
    pub fn open(path: &str) -> Result<Self, DatabaseError> {
        let conn = duckdb::Connection::open(path)
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        debug!(path, "Opened DuckDB database");
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn memory() -> Result<Self, DatabaseError> {
        let conn = duckdb::Connection::open_in_memory()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Ok(Self { conn, path: None })
    }

    /// Get the database path (if not in-memory)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Run a script of statements, e.g. DDL or routine definitions
    pub fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn transaction_statement(&self, sql: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| DatabaseError::Transaction(e.to_string()))
    }
}

impl Database for DuckDbConnection {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.transaction_statement("BEGIN TRANSACTION")
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.transaction_statement("COMMIT")
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.transaction_statement("ROLLBACK")
    }

    fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        let affected = self.conn.execute(sql, [])?;
        Ok(affected as u64)
    }

    fn execute_with(&self, sql: &str, params: &[Option<&str>]) -> Result<u64, DatabaseError> {
        let affected = self
            .conn
            .execute(sql, duckdb::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query_i64(&self, sql: &str) -> Result<Option<i64>, DatabaseError> {
        match self
            .conn
            .query_row(sql, [], |row| row.get::<_, Option<i64>>(0))
        {
            Ok(value) => Ok(value),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn call_procedure(&self, routine: &Identifier) -> Result<(), DatabaseError> {
        // Result set of the macro is discarded; only a raised error matters
        self.conn
            .execute_batch(&self.dialect().procedure_call(routine))?;
        Ok(())
    }

    fn table_exists(&self, table: &Identifier) -> Result<bool, DatabaseError> {
        let count: i64 = match table.schema() {
            Some(schema) => self.conn.query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ?1 AND table_name = ?2",
                [schema, table.name()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?1",
                [table.name()],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_database() {
        let db = DuckDbConnection::memory().unwrap();
        assert!(db.path().is_none());
        assert_eq!(db.dialect(), Dialect::DuckDb);
    }

    #[test]
    fn test_table_exists() {
        let db = DuckDbConnection::memory().unwrap();
        let table = Identifier::parse("clients_temporary").unwrap();
        assert!(!db.table_exists(&table).unwrap());

        db.execute_batch("CREATE TABLE clients_temporary (id VARCHAR, name VARCHAR)")
            .unwrap();
        assert!(db.table_exists(&table).unwrap());
        assert_eq!(db.row_count(&table).unwrap(), 0);
    }

    #[test]
    fn test_execute_with_null() {
        let db = DuckDbConnection::memory().unwrap();
        db.execute_batch("CREATE TABLE t (a VARCHAR, b VARCHAR)").unwrap();

        let inserted = db
            .execute_with("INSERT INTO t VALUES (?, ?)", &[Some("x"), None])
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(
            db.query_i64("SELECT COUNT(*) FROM t WHERE b IS NULL").unwrap(),
            Some(1)
        );
    }

    #[test]
    fn test_rollback_discards_changes() {
        let db = DuckDbConnection::memory().unwrap();
        db.execute_batch("CREATE TABLE t (a VARCHAR)").unwrap();

        db.begin().unwrap();
        db.execute("INSERT INTO t VALUES ('kept?')").unwrap();
        db.rollback().unwrap();

        assert_eq!(db.query_i64("SELECT COUNT(*) FROM t").unwrap(), Some(0));
    }

    #[test]
    fn test_query_without_rows() {
        let db = DuckDbConnection::memory().unwrap();
        db.execute_batch("CREATE TABLE t (a BIGINT)").unwrap();
        assert_eq!(db.query_i64("SELECT a FROM t").unwrap(), None);
    }
}
