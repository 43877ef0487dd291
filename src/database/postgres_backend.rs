//! PostgreSQL connection behind a blocking API
//!
//! `tokio-postgres` is async; the pipeline is strictly sequential, so each
//! connection owns a private current-thread runtime and blocks on every call.

use std::error::Error;

use bytes::BytesMut;
use tokio::runtime::Runtime;
use tokio_postgres::types::{Format, IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use super::{ConnectionConfig, Database, DatabaseError, Dialect};
use crate::staging::Identifier;

/// PostgreSQL connection
pub struct PostgresConnection {
    runtime: Runtime,
    client: Client,
    description: String,
}

impl PostgresConnection {
    /// Connect using the given parameters
    pub fn connect(config: &ConnectionConfig) -> Result<Self, DatabaseError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DatabaseError::Connection(format!("failed to start runtime: {e}")))?;

        let pg_config = config.to_pg_config();
        let (client, connection) = runtime
            .block_on(pg_config.connect(NoTls))
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        // Drives the socket whenever the runtime is blocked on a client call
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        debug!(connection = %config, "Connected to PostgreSQL");

        Ok(Self {
            runtime,
            client,
            description: config.to_string(),
        })
    }

    /// Connection description (never includes the password)
    pub fn description(&self) -> &str {
        &self.description
    }

    fn transaction_statement(&self, sql: &str) -> Result<(), DatabaseError> {
        self.runtime
            .block_on(self.client.batch_execute(sql))
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::Query(msg) => DatabaseError::Transaction(msg),
                other => other,
            })
    }
}

impl Database for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.transaction_statement("BEGIN")
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.transaction_statement("COMMIT")
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.transaction_statement("ROLLBACK")
    }

    fn execute(&self, sql: &str) -> Result<u64, DatabaseError> {
        let affected = self.runtime.block_on(self.client.execute(sql, &[]))?;
        Ok(affected)
    }

    fn execute_with(&self, sql: &str, params: &[Option<&str>]) -> Result<u64, DatabaseError> {
        let values: Vec<TextParam<'_>> = params.iter().map(|v| TextParam(*v)).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let affected = self.runtime.block_on(self.client.execute(sql, &refs))?;
        Ok(affected)
    }

    fn query_i64(&self, sql: &str) -> Result<Option<i64>, DatabaseError> {
        let row = self.runtime.block_on(self.client.query_opt(sql, &[]))?;
        match row {
            Some(row) => Ok(row.try_get::<_, Option<i64>>(0)?),
            None => Ok(None),
        }
    }

    fn table_exists(&self, table: &Identifier) -> Result<bool, DatabaseError> {
        let name = TextParam(Some(table.as_str()));
        let row = self.runtime.block_on(
            self.client
                .query_one("SELECT to_regclass($1::text) IS NOT NULL", &[&name]),
        )?;
        Ok(row.try_get::<_, bool>(0)?)
    }
}

/// A type-erased value sent in text format
///
/// The server parses the text with the input function of whatever type the
/// placeholder resolves to, exactly as it would for a quoted literal.
#[derive(Debug)]
struct TextParam<'a>(Option<&'a str>);

impl ToSql for TextParam<'_> {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            Some(value) => {
                out.extend_from_slice(value.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_param_encoding() {
        let mut buf = BytesMut::new();
        let param = TextParam(Some("42"));
        let is_null = param.to_sql(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&buf[..], b"42");
        assert!(matches!(param.encode_format(&Type::INT4), Format::Text));
    }

    #[test]
    fn test_text_param_null() {
        let mut buf = BytesMut::new();
        let is_null = TextParam(None).to_sql(&Type::TEXT, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_text_param_accepts_any_type() {
        assert!(<TextParam<'_> as ToSql>::accepts(&Type::DATE));
        assert!(<TextParam<'_> as ToSql>::accepts(&Type::NUMERIC));
    }
}
