//! Staged ingestion pipeline
//!
//! Each run takes one entity's data file through these phases:
//!
//! 1. **Clear**: empty the staging table (committed on its own)
//! 2. **Load**: insert every source record into the staging table
//! 3. **Validate**: call the server-side validation routine
//! 4. **Promote** (optional): copy staged rows into the destination table
//! 5. **Commit**: finalize the load transaction
//!
//! Any failure aborts the run and rolls the load transaction back, so a
//! destination row is never visible unless validation passed.
//!
//! # Example
//!
//! ```rust,ignore
//! use staged_ingest::database::{ConnectionConfig, PostgresConnection};
//! use staged_ingest::pipeline::{EntityKind, PipelineConfig, PipelineExecutor};
//!
//! let config = PipelineConfig::load("pipeline.toml")?;
//! let db = PostgresConnection::connect(&config.connection)?;
//!
//! let mut executor = PipelineExecutor::new(db, config);
//! let report = executor.run_file(EntityKind::Employees, "/data/import")?;
//! report.print_summary();
//! ```
//!
//! # Dry Run
//!
//! Read and check the data file without touching the database:
//!
//! ```rust,ignore
//! let config = PipelineConfig::new().with_dry_run(true);
//! let mut executor = PipelineExecutor::new(db, config);
//! let report = executor.run_file(EntityKind::Clients, "/data/import")?;
//! assert_eq!(report.rows_loaded, 0);
//! ```

mod config;
mod error;
mod executor;

pub use config::{EntityConfig, EntityKind, PipelineConfig, Promotion};
pub use error::{ConfigError, Phase, PipelineError, PipelineResult};
pub use executor::{PipelineExecutor, PipelineReport, RunState};
