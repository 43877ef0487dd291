//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::database::ConnectionConfig;
use crate::pipeline::EntityKind;

/// Load data files into a database through a validated staging table
#[derive(Debug, Parser)]
#[command(
    name = "staged-ingest",
    version,
    about = "Load data files into a database through a validated staging table"
)]
pub struct Cli {
    /// Directory holding the data files
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Entity to ingest (clients, employees, projects, month-work); repeatable
    #[arg(
        short,
        long = "entity",
        value_name = "ENTITY",
        default_value = "clients"
    )]
    pub entities: Vec<EntityKind>,

    /// Data file to use instead of the configured one (single entity only)
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Database server host
    #[arg(long)]
    pub host: Option<String>,

    /// Database server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Database name
    #[arg(long)]
    pub database: Option<String>,

    /// Database user
    #[arg(long)]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "STAGED_INGEST_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database backend
    #[arg(long, value_enum, default_value_t = Backend::Postgres)]
    pub backend: Backend,

    /// Database file for the duckdb backend
    #[arg(long, value_name = "PATH", default_value = "staged-ingest.duckdb")]
    pub duckdb_path: PathBuf,

    /// Pipeline config file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Read and check the data files without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print run reports as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Database backend to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// PostgreSQL server
    Postgres,
    /// Embedded DuckDB file
    Duckdb,
}

impl Cli {
    /// Apply connection overrides given on the command line
    pub fn connection(&self, base: ConnectionConfig) -> ConnectionConfig {
        let mut config = base;
        if let Some(host) = &self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(database) = &self.database {
            config = config.with_database(database);
        }
        if let Some(user) = &self.user {
            config = config.with_user(user);
        }
        if let Some(password) = &self.password {
            config = config.with_password(password);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["staged-ingest", "./data"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("./data"));
        assert_eq!(cli.entities, vec![EntityKind::Clients]);
        assert_eq!(cli.backend, Backend::Postgres);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_repeated_entities_keep_order() {
        let cli = Cli::try_parse_from([
            "staged-ingest",
            "./data",
            "-e",
            "month-work",
            "--entity",
            "employees",
        ])
        .unwrap();
        assert_eq!(
            cli.entities,
            vec![EntityKind::MonthWork, EntityKind::Employees]
        );
    }

    #[test]
    fn test_unknown_entity_rejected() {
        assert!(Cli::try_parse_from(["staged-ingest", "./data", "-e", "invoices"]).is_err());
    }

    #[test]
    fn test_connection_overrides() {
        let cli = Cli::try_parse_from([
            "staged-ingest",
            "./data",
            "--host",
            "db.internal",
            "--port",
            "6543",
            "--user",
            "loader",
        ])
        .unwrap();

        let config = cli.connection(ConnectionConfig::default());
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.user, "loader");
        assert_eq!(config.database, "company-management");
    }
}
