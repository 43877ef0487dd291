//! Staging area: reading tabular sources and filling staging tables
//!
//! A staging table is a transient holding area. Every run clears it before
//! loading, so its content never outlives the next run.
//!
//! # Example
//!
//! ```rust,ignore
//! use staged_ingest::staging::{CsvSource, Identifier, LoadStrategy, StagingLoader};
//!
//! let table = Identifier::parse("clients_temporary")?;
//! let loader = StagingLoader::new(&db, LoadStrategy::default());
//! loader.clear(&table)?;
//! let stats = loader.load(&table, &mut CsvSource::open("data/clients.csv"))?;
//! ```

mod error;
mod loader;
mod source;
pub mod sql;

pub use error::LoadError;
pub use loader::{DEFAULT_BATCH_SIZE, LoadStats, LoadStrategy, StagingLoader};
pub use source::{CsvSource, InMemorySource, Record, SourceData, TabularSource};
pub use sql::{Identifier, InvalidIdentifier};
