//! Pipeline configuration types

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ConfigError;
use crate::database::ConnectionConfig;
use crate::staging::{Identifier, LoadStrategy};
use crate::validation::ValidationProtocol;

/// Entity kinds that can be ingested, one data file each
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Clients,
    Employees,
    Projects,
    MonthWork,
}

impl EntityKind {
    /// All entity kinds
    pub fn all() -> Vec<Self> {
        vec![
            Self::Clients,
            Self::Employees,
            Self::Projects,
            Self::MonthWork,
        ]
    }

    /// Entity name as used on the command line and in config files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Employees => "employees",
            Self::Projects => "projects",
            Self::MonthWork => "month-work",
        }
    }

    /// Snake-case stem shared by the data file and database objects
    fn stem(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Employees => "employees",
            Self::Projects => "projects",
            Self::MonthWork => "month_work",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clients" => Ok(Self::Clients),
            "employees" => Ok(Self::Employees),
            "projects" => Ok(Self::Projects),
            "month-work" | "month_work" => Ok(Self::MonthWork),
            _ => Err(ConfigError::UnknownEntity(s.to_string())),
        }
    }
}

/// Who moves validated rows from staging into the destination table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Promotion {
    /// The validation routine promotes the rows itself
    #[default]
    Routine,
    /// The pipeline copies staging into `destination` after a pass
    Copy {
        destination: Identifier,
        /// Empty the destination first, so it mirrors the latest data file
        #[serde(default)]
        replace: bool,
    },
}

fn default_delimiter() -> char {
    ','
}

/// Per-entity settings: data file, staging table and validation routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Data file name, relative to the data directory
    pub file: PathBuf,
    /// Staging table receiving the raw records
    pub staging_table: Identifier,
    /// Server-side validation routine
    pub routine: Identifier,
    #[serde(default)]
    pub protocol: ValidationProtocol,
    #[serde(default)]
    pub promotion: Promotion,
    #[serde(default)]
    pub strategy: LoadStrategy,
    /// Field delimiter of the data file (single ASCII character)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl EntityConfig {
    /// Create an entity config with default protocol, promotion and strategy
    pub fn new(file: impl Into<PathBuf>, staging_table: Identifier, routine: Identifier) -> Self {
        Self {
            file: file.into(),
            staging_table,
            routine,
            protocol: ValidationProtocol::default(),
            promotion: Promotion::default(),
            strategy: LoadStrategy::default(),
            delimiter: default_delimiter(),
        }
    }

    /// Create an entity config from unvalidated table and routine names
    pub fn named(
        file: impl Into<PathBuf>,
        staging_table: &str,
        routine: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            file,
            Identifier::parse(staging_table)?,
            Identifier::parse(routine)?,
        ))
    }

    /// Built-in settings for an entity kind
    pub fn defaults_for(kind: EntityKind) -> Self {
        let stem = kind.stem();
        Self {
            file: PathBuf::from(format!("{stem}.csv")),
            staging_table: Identifier::from_trusted(format!("{stem}_temporary")),
            routine: Identifier::from_trusted(format!("{stem}_validation_procedure")),
            protocol: ValidationProtocol::default(),
            promotion: Promotion::default(),
            strategy: LoadStrategy::default(),
            delimiter: default_delimiter(),
        }
    }

    /// Set the validation protocol
    pub fn with_protocol(mut self, protocol: ValidationProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the promotion mode
    pub fn with_promotion(mut self, promotion: Promotion) -> Self {
        self.promotion = promotion;
        self
    }

    /// Set the load strategy
    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::Invalid {
                entity: self.staging_table.to_string(),
                reason: format!("delimiter '{}' is not a single ASCII character", self.delimiter),
            })
        }
    }

    fn validate(&self, entity: &str) -> Result<(), ConfigError> {
        self.delimiter_byte().map_err(|_| ConfigError::Invalid {
            entity: entity.to_string(),
            reason: format!("delimiter '{}' is not a single ASCII character", self.delimiter),
        })?;

        if let Promotion::Copy { destination, .. } = &self.promotion {
            if destination == &self.staging_table {
                return Err(ConfigError::Invalid {
                    entity: entity.to_string(),
                    reason: "copy destination is the staging table itself".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Database connection parameters (PostgreSQL backend)
    pub connection: ConnectionConfig,
    /// Entity settings keyed by entity name; missing entities use built-in defaults
    pub entities: BTreeMap<String, EntityConfig>,
    /// Read and check sources without touching the database
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            entities: EntityKind::all()
                .into_iter()
                .map(|kind| (kind.name().to_string(), EntityConfig::defaults_for(kind)))
                .collect(),
            dry_run: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config with the built-in entity table
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Set the connection parameters
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Replace the settings of one entity
    pub fn with_entity(mut self, kind: EntityKind, entity: EntityConfig) -> Self {
        self.entities.insert(kind.name().to_string(), entity);
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Settings for an entity kind
    pub fn entity(&self, kind: EntityKind) -> EntityConfig {
        self.entities
            .iter()
            .find(|(name, _)| name.parse::<EntityKind>().ok() == Some(kind))
            .map(|(_, entity)| entity.clone())
            .unwrap_or_else(|| EntityConfig::defaults_for(kind))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, entity) in &self.entities {
            name.parse::<EntityKind>()?;
            entity.validate(name)?;
        }
        Ok(())
    }
}
