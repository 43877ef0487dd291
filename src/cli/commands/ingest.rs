//! Ingest command implementation

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::args::{Backend, Cli};
use crate::cli::output::print_reports;
use crate::database::{Database, Disconnected};
use crate::pipeline::{PipelineConfig, PipelineExecutor};

/// Handle the ingest command
///
/// Setup failures (config, arguments, connection) are returned as errors.
/// Pipeline failures are reported here and yield `Ok(false)`; entities after
/// the first failing one are not run.
pub fn handle_ingest(cli: &Cli) -> Result<bool> {
    if cli.file.is_some() && cli.entities.len() > 1 {
        bail!("--file can only be used with a single --entity");
    }

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.connection = cli.connection(config.connection);
    config.dry_run = config.dry_run || cli.dry_run;

    if config.dry_run {
        info!("Dry run: no database connection will be opened");
        return run_entities(Disconnected, config, cli);
    }

    match cli.backend {
        Backend::Postgres => run_postgres(config, cli),
        Backend::Duckdb => run_duckdb(config, cli),
    }
}

#[cfg(feature = "postgres-backend")]
fn run_postgres(config: PipelineConfig, cli: &Cli) -> Result<bool> {
    use crate::database::PostgresConnection;

    let db = PostgresConnection::connect(&config.connection)
        .with_context(|| format!("Failed to connect to {}", config.connection))?;
    info!(
        connection = %db.description(),
        dialect = db.dialect().name(),
        "Connected"
    );
    run_entities(db, config, cli)
}

#[cfg(not(feature = "postgres-backend"))]
fn run_postgres(_config: PipelineConfig, _cli: &Cli) -> Result<bool> {
    bail!("This build does not include the postgres backend (feature `postgres-backend`)")
}

#[cfg(feature = "duckdb-backend")]
fn run_duckdb(config: PipelineConfig, cli: &Cli) -> Result<bool> {
    use crate::database::DuckDbConnection;

    let path = cli.duckdb_path.display().to_string();
    let db = DuckDbConnection::open(&path)
        .with_context(|| format!("Failed to open DuckDB database {path}"))?;
    info!(path = %path, dialect = db.dialect().name(), "Opened database");
    run_entities(db, config, cli)
}

#[cfg(not(feature = "duckdb-backend"))]
fn run_duckdb(_config: PipelineConfig, _cli: &Cli) -> Result<bool> {
    bail!("This build does not include the duckdb backend (feature `duckdb-backend`)")
}

fn run_entities<D: Database>(db: D, config: PipelineConfig, cli: &Cli) -> Result<bool> {
    let mut executor = PipelineExecutor::new(db, config);
    let mut reports = Vec::new();
    let mut success = true;

    for &entity in &cli.entities {
        debug!(entity = %entity, "Running entity");
        let result = match &cli.file {
            Some(path) => executor.run_path(entity, path),
            None => executor.run_file(entity, &cli.data_dir),
        };

        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                if let Some(report) = executor.last_report() {
                    reports.push(report.clone());
                }
                if !cli.json {
                    eprintln!("Error: {}", e.user_message());
                }
                success = false;
                break;
            }
        }
    }

    print_reports(&reports, cli.json).context("Failed to write run reports")?;
    Ok(success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_needs_single_entity() {
        let cli = Cli::try_parse_from([
            "staged-ingest",
            "./data",
            "-e",
            "clients",
            "-e",
            "projects",
            "--file",
            "x.csv",
        ])
        .unwrap();
        let err = handle_ingest(&cli).unwrap_err();
        assert!(err.to_string().contains("--file"));
    }

    #[test]
    fn test_dry_run_reads_without_connecting() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("clients.csv"), "id,name\n1,A\n2,B\n").unwrap();
        let data_dir = dir.path().display().to_string();

        let cli = Cli::try_parse_from(["staged-ingest", data_dir.as_str(), "--dry-run", "--json"])
            .unwrap();
        assert!(handle_ingest(&cli).unwrap());
    }

    #[test]
    fn test_dry_run_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().display().to_string();

        let cli = Cli::try_parse_from([
            "staged-ingest",
            data_dir.as_str(),
            "--dry-run",
            "--json",
            "-e",
            "employees",
        ])
        .unwrap();
        assert!(!handle_ingest(&cli).unwrap());
    }

    #[test]
    fn test_bad_config_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("pipeline.toml");
        fs::write(&config_path, "[entities.invoices]\nfile = 1\n").unwrap();

        let cli = Cli::try_parse_from([
            "staged-ingest",
            "./data",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();
        let err = handle_ingest(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
