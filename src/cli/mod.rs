//! CLI module for the staged-ingest binary

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Backend, Cli};
