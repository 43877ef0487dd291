//! Staging table loader: clear, then load a tabular source

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::LoadError;
use super::source::{SourceData, TabularSource};
use super::sql::{self, Identifier};
use crate::database::Database;

/// Default number of records per multi-row insert
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// How records are written into the staging table
///
/// Both strategies write inside the caller's transaction; the choice affects
/// throughput only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LoadStrategy {
    /// Multi-row `INSERT ... VALUES` statements of up to `batch_size` records
    Bulk {
        #[serde(default = "default_batch_size")]
        batch_size: usize,
    },
    /// One parameterized single-row `INSERT` per record
    RowByRow,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for LoadStrategy {
    fn default() -> Self {
        LoadStrategy::Bulk {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl LoadStrategy {
    /// Records per statement for a source with `columns` columns
    fn rows_per_statement(&self, columns: usize, max_params: usize) -> usize {
        match self {
            LoadStrategy::RowByRow => 1,
            LoadStrategy::Bulk { batch_size } => {
                let by_params = (max_params / columns.max(1)).max(1);
                (*batch_size).clamp(1, by_params)
            }
        }
    }
}

/// Statistics from a load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStats {
    /// Records inserted
    pub rows: usize,
    /// Column names, in insert order
    pub columns: Vec<String>,
    /// Insert statements issued
    pub batches: usize,
    /// Whether the staging table had to be created
    pub created_table: bool,
    /// Duration of the load
    #[serde(skip)]
    pub duration: Duration,
}

/// Clears and fills one staging table through a borrowed connection
///
/// The loader never opens, commits or closes transactions; sequencing of
/// `clear` before `load` is the caller's job.
pub struct StagingLoader<'a, D: Database + ?Sized> {
    db: &'a D,
    strategy: LoadStrategy,
}

impl<'a, D: Database + ?Sized> StagingLoader<'a, D> {
    /// Create a loader using the given insert strategy
    pub fn new(db: &'a D, strategy: LoadStrategy) -> Self {
        Self { db, strategy }
    }

    /// Insert strategy in use
    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Delete every row of the staging table, keeping its structure
    ///
    /// Returns the number of rows removed.
    pub fn clear(&self, table: &Identifier) -> Result<u64, LoadError> {
        let deleted = self
            .db
            .execute(&sql::delete_all(table))
            .map_err(|e| LoadError::write(table, e))?;
        debug!(table = %table, deleted, "Cleared staging table");
        Ok(deleted)
    }

    /// Read the whole source, then insert every record into the staging table
    ///
    /// Nothing is written when the source cannot be read or violates its own
    /// column set.
    pub fn load(
        &self,
        table: &Identifier,
        source: &mut dyn TabularSource,
    ) -> Result<LoadStats, LoadError> {
        let start = Instant::now();
        let data = source.read_all()?;
        check_column_set(&data)?;

        let columns: Vec<String> = match data.records.first() {
            Some(first) => first.columns().to_vec(),
            None => data.columns.to_vec(),
        };

        let mut stats = LoadStats {
            columns: columns.clone(),
            ..Default::default()
        };

        let exists = self
            .db
            .table_exists(table)
            .map_err(|e| LoadError::write(table, e))?;
        if !exists {
            self.db
                .execute(&sql::create_text_table(table, &columns))
                .map_err(|e| LoadError::write(table, e))?;
            stats.created_table = true;
            info!(table = %table, columns = columns.len(), "Created staging table");
        }

        let dialect = self.db.dialect();
        let per_statement = self
            .strategy
            .rows_per_statement(columns.len(), dialect.max_params());

        let mut full_sql: Option<String> = None;
        for chunk in data.records.chunks(per_statement) {
            let params: Vec<Option<&str>> = chunk
                .iter()
                .flat_map(|record| record.values().iter().map(|v| v.as_deref()))
                .collect();

            let statement = if chunk.len() == per_statement {
                full_sql
                    .get_or_insert_with(|| {
                        sql::insert_rows(dialect, table, &columns, per_statement)
                    })
                    .clone()
            } else {
                sql::insert_rows(dialect, table, &columns, chunk.len())
            };

            self.db
                .execute_with(&statement, &params)
                .map_err(|e| LoadError::write(table, e))?;

            stats.rows += chunk.len();
            stats.batches += 1;
        }

        stats.duration = start.elapsed();
        debug!(
            table = %table,
            source = %source.describe(),
            rows = stats.rows,
            batches = stats.batches,
            "Loaded staging table"
        );

        Ok(stats)
    }
}

/// Every record must carry exactly the column set of the first one
fn check_column_set(data: &SourceData) -> Result<(), LoadError> {
    let Some(first) = data.records.first() else {
        return Ok(());
    };
    let expected = first.columns();

    for (idx, record) in data.records.iter().enumerate() {
        if record.columns() != expected || record.len() != expected.len() {
            return Err(LoadError::SchemaMismatch {
                record: idx + 1,
                expected: expected.len(),
                found: record.len(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(LoadStrategy::RowByRow.rows_per_statement(5, 65_535), 1);
        assert_eq!(
            LoadStrategy::Bulk { batch_size: 100 }.rows_per_statement(5, 65_535),
            100
        );
        // Capped by the parameter limit
        assert_eq!(
            LoadStrategy::Bulk { batch_size: 50_000 }.rows_per_statement(10, 65_535),
            6_553
        );
        assert_eq!(
            LoadStrategy::Bulk { batch_size: 0 }.rows_per_statement(3, 65_535),
            1
        );
    }

    #[test]
    fn test_strategy_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            strategy: LoadStrategy,
        }

        let bulk: Holder = toml::from_str("strategy = { type = \"bulk\" }").unwrap();
        assert_eq!(
            bulk.strategy,
            LoadStrategy::Bulk {
                batch_size: DEFAULT_BATCH_SIZE
            }
        );

        let row: Holder = toml::from_str("strategy = { type = \"row-by-row\" }").unwrap();
        assert_eq!(row.strategy, LoadStrategy::RowByRow);
    }
}
