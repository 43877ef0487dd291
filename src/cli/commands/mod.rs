//! CLI command implementations

pub mod ingest;

pub use ingest::handle_ingest;
