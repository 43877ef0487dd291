//! Staged Ingest - load tabular files into a relational database through a staging table
//!
//! Every run goes through the same phases:
//! - clear the staging table
//! - bulk-load the source file into it
//! - call the server-side validation routine
//! - commit (promoting the rows to the destination table) or abort
//!
//! A destination row is never visible unless validation passed. Staging content
//! from a failed run survives only until the next run clears it.
//!
//! # Example
//!
//! ```rust,ignore
//! use staged_ingest::database::DuckDbConnection;
//! use staged_ingest::pipeline::{EntityKind, PipelineConfig, PipelineExecutor};
//!
//! let db = DuckDbConnection::open("company.duckdb")?;
//! let mut executor = PipelineExecutor::new(db, PipelineConfig::default());
//! let report = executor.run_file(EntityKind::Clients, "./data")?;
//! println!("{} rows committed", report.rows_loaded);
//! ```

pub mod database;
pub mod pipeline;
pub mod staging;
pub mod validation;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use database::{ConnectionConfig, Database, DatabaseError, Dialect, Disconnected};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDbConnection;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresConnection;
pub use pipeline::{
    ConfigError, EntityConfig, EntityKind, Phase, PipelineConfig, PipelineError, PipelineExecutor,
    PipelineReport, PipelineResult, Promotion, RunState,
};
pub use staging::{
    CsvSource, Identifier, InMemorySource, LoadError, LoadStats, LoadStrategy, Record,
    SourceData, StagingLoader, TabularSource,
};
pub use validation::{
    FunctionValidator, ProcedureValidator, ValidationError, ValidationOutcome, ValidationProtocol,
    Validator,
};
