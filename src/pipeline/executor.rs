//! Pipeline executor for staged ingestion runs

use std::fmt;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::config::{EntityConfig, EntityKind, PipelineConfig, Promotion};
use super::error::{Phase, PipelineError, PipelineResult};
use crate::database::{Database, DatabaseError};
use crate::staging::{
    CsvSource, Identifier, LoadError, LoadStats, StagingLoader, TabularSource, sql,
};
use crate::validation::validator_for;

/// State of a pipeline run
///
/// Runs only move forward: `Start → Cleared → Loaded → Validated → Committed`,
/// or from any non-terminal state to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Start,
    Cleared,
    Loaded,
    Validated,
    Committed,
    Aborted,
}

impl RunState {
    /// Get state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Cleared => "cleared",
            Self::Loaded => "loaded",
            Self::Validated => "validated",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }

    /// Check if the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }

    /// State after the current phase succeeds, `None` once terminal
    pub fn advance(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Cleared),
            Self::Cleared => Some(Self::Loaded),
            Self::Loaded => Some(Self::Validated),
            Self::Validated => Some(Self::Committed),
            Self::Committed | Self::Aborted => None,
        }
    }

    /// State after the current phase fails, `None` once terminal
    pub fn abort(self) -> Option<Self> {
        if self.is_terminal() {
            None
        } else {
            Some(Self::Aborted)
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runs clear, load, validate and commit for one entity at a time
///
/// The executor owns the connection and is the only component that begins,
/// commits or rolls back transactions. The clear phase commits on its own;
/// load, validation, optional copy promotion and the final commit share a
/// single transaction that is rolled back on any failure.
pub struct PipelineExecutor<D: Database> {
    db: D,
    config: PipelineConfig,
    state: RunState,
    last_report: Option<PipelineReport>,
}

impl<D: Database> PipelineExecutor<D> {
    /// Create a new pipeline executor
    pub fn new(db: D, config: PipelineConfig) -> Self {
        Self {
            db,
            config,
            state: RunState::Start,
            last_report: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// State of the current or most recent run
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Report of the most recent run, successful or not
    pub fn last_report(&self) -> Option<&PipelineReport> {
        self.last_report.as_ref()
    }

    /// Get the connection
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Give the connection back
    pub fn into_database(self) -> D {
        self.db
    }

    /// Run an entity from its configured file inside `data_dir`
    pub fn run_file(
        &mut self,
        entity: EntityKind,
        data_dir: impl AsRef<Path>,
    ) -> PipelineResult<PipelineReport> {
        let settings = self.config.entity(entity);
        let path = data_dir.as_ref().join(&settings.file);
        self.run_path(entity, path)
    }

    /// Run an entity from an explicit data file
    pub fn run_path(
        &mut self,
        entity: EntityKind,
        path: impl AsRef<Path>,
    ) -> PipelineResult<PipelineReport> {
        self.last_report = None;
        self.state = RunState::Start;
        let delimiter = self.config.entity(entity).delimiter_byte()?;
        let mut source = CsvSource::open(path).with_delimiter(delimiter);
        self.run(entity, &mut source)
    }

    /// Run the pipeline for one entity
    pub fn run(
        &mut self,
        entity: EntityKind,
        source: &mut dyn TabularSource,
    ) -> PipelineResult<PipelineReport> {
        let settings = self.config.entity(entity);
        let dry_run = self.config.dry_run;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        self.state = RunState::Start;

        let _span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            entity = %entity,
            dry_run
        )
        .entered();

        info!(
            staging_table = %settings.staging_table,
            routine = %settings.routine,
            protocol = settings.protocol.name(),
            source = %source.describe(),
            "Starting pipeline run"
        );

        let result = if dry_run {
            self.dry_run(source)
        } else {
            self.execute(&settings, source)
        };

        let mut report = PipelineReport {
            run_id,
            entity,
            state: self.state,
            rows_read: 0,
            rows_loaded: 0,
            message: String::new(),
            failed_phase: None,
            error_kind: None,
            dry_run,
            duration_ms: 0,
            started_at,
        };

        match result {
            Ok(rows) => {
                report.rows_read = rows;
                if dry_run {
                    report.message = format!("Dry run: {rows} records read, database untouched");
                } else {
                    report.rows_loaded = rows;
                    report.message = format!("{rows} rows validated and committed");
                }
                report.duration_ms = start.elapsed().as_millis() as u64;

                info!(
                    rows,
                    state = %self.state,
                    duration_ms = report.duration_ms,
                    "Pipeline run finished"
                );
                self.last_report = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                if let Some(aborted) = self.state.abort() {
                    self.state = aborted;
                }
                report.state = self.state;
                report.failed_phase = e.phase();
                report.error_kind = Some(e.kind().to_string());
                report.message = e.to_string();
                report.duration_ms = start.elapsed().as_millis() as u64;

                error!(
                    phase = e.phase().map(|p| p.name()).unwrap_or("setup"),
                    kind = e.kind(),
                    error = %e,
                    "Pipeline run aborted"
                );
                self.last_report = Some(report);
                Err(e)
            }
        }
    }

    /// Clear in its own transaction, then stage, validate and commit in another
    fn execute(
        &mut self,
        settings: &EntityConfig,
        source: &mut dyn TabularSource,
    ) -> PipelineResult<usize> {
        self.clear(settings)?;
        self.advance();

        self.db.begin().map_err(|e| {
            PipelineError::LoadFailed(LoadError::write(&settings.staging_table, e))
        })?;
        match self.stage_and_commit(settings, source) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                self.rollback(e.phase().unwrap_or(Phase::Load));
                Err(e)
            }
        }
    }

    fn clear(&self, settings: &EntityConfig) -> PipelineResult<()> {
        let _phase = info_span!("pipeline_phase", phase = Phase::Clear.name()).entered();
        let failed = |e: DatabaseError| {
            PipelineError::ClearFailed(LoadError::write(&settings.staging_table, e))
        };

        self.db.begin().map_err(failed)?;
        let loader = StagingLoader::new(&self.db, settings.strategy);
        let deleted = match loader.clear(&settings.staging_table) {
            Ok(deleted) => deleted,
            Err(e) => {
                self.rollback(Phase::Clear);
                return Err(PipelineError::ClearFailed(e));
            }
        };

        if let Err(e) = self.db.commit() {
            self.rollback(Phase::Clear);
            return Err(failed(e));
        }

        info!(
            staging_table = %settings.staging_table,
            deleted,
            "Staging table cleared"
        );
        Ok(())
    }

    fn stage_and_commit(
        &mut self,
        settings: &EntityConfig,
        source: &mut dyn TabularSource,
    ) -> PipelineResult<usize> {
        let stats = self.load(settings, source)?;
        self.advance();

        self.validate(settings)?;
        self.advance();

        if let Promotion::Copy {
            destination,
            replace,
        } = &settings.promotion
        {
            self.promote(settings, destination, *replace, &stats)?;
        }

        {
            let _phase = info_span!("pipeline_phase", phase = Phase::Commit.name()).entered();
            self.db.commit().map_err(PipelineError::CommitFailed)?;
            info!(rows = stats.rows, "Transaction committed");
        }
        self.advance();

        Ok(stats.rows)
    }

    fn load(
        &self,
        settings: &EntityConfig,
        source: &mut dyn TabularSource,
    ) -> PipelineResult<LoadStats> {
        let _phase = info_span!("pipeline_phase", phase = Phase::Load.name()).entered();

        let loader = StagingLoader::new(&self.db, settings.strategy);
        let stats = loader
            .load(&settings.staging_table, source)
            .map_err(PipelineError::LoadFailed)?;

        info!(
            staging_table = %settings.staging_table,
            rows = stats.rows,
            batches = stats.batches,
            duration_ms = stats.duration.as_millis() as u64,
            "Staging table loaded"
        );
        Ok(stats)
    }

    fn validate(&self, settings: &EntityConfig) -> PipelineResult<()> {
        let _phase = info_span!("pipeline_phase", phase = Phase::Validate.name()).entered();

        let validator = validator_for(settings.protocol, settings.routine.clone());
        let outcome = validator.validate(&self.db)?;
        outcome.into_result(validator.routine())?;

        info!(routine = %settings.routine, "Validation passed");
        Ok(())
    }

    fn promote(
        &self,
        settings: &EntityConfig,
        destination: &Identifier,
        replace: bool,
        stats: &LoadStats,
    ) -> PipelineResult<()> {
        let _phase = info_span!("pipeline_phase", phase = Phase::Promote.name()).entered();
        let failed = |source| PipelineError::PromotionFailed {
            destination: destination.to_string(),
            source,
        };

        if replace {
            let removed = self.db.execute(&sql::delete_all(destination)).map_err(failed)?;
            debug!(destination = %destination, removed, "Destination emptied");
        }

        if stats.rows == 0 {
            debug!(destination = %destination, "Nothing staged, skipping promotion");
            return Ok(());
        }

        let statement = sql::copy_rows(&settings.staging_table, destination, &stats.columns);
        let copied = self.db.execute(&statement).map_err(failed)?;

        info!(destination = %destination, rows = copied, "Staged rows promoted");
        Ok(())
    }

    /// Read the source without touching the database
    fn dry_run(&self, source: &mut dyn TabularSource) -> PipelineResult<usize> {
        let data = source.read_all().map_err(PipelineError::LoadFailed)?;
        info!(
            columns = data.columns.len(),
            records = data.len(),
            "Dry run: source read, database untouched"
        );
        Ok(data.len())
    }

    /// Roll back after a failure; a failing rollback never replaces the original error
    fn rollback(&self, phase: Phase) {
        match self.db.rollback() {
            Ok(()) => debug!(phase = phase.name(), "Transaction rolled back"),
            Err(e) => warn!(phase = phase.name(), error = %e, "Rollback failed"),
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.advance() {
            debug!(from = %self.state, to = %next, "Run state changed");
            self.state = next;
        }
    }
}

/// Report from a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Run ID
    pub run_id: Uuid,
    /// Entity that was ingested
    pub entity: EntityKind,
    /// Final state; a dry run never leaves `start`, see `dry_run`
    pub state: RunState,
    /// Records read from the source
    pub rows_read: usize,
    /// Rows committed through the staging table
    pub rows_loaded: usize,
    /// Outcome message (the error text for aborted runs)
    pub message: String,
    /// Phase that failed, for aborted runs
    pub failed_phase: Option<Phase>,
    /// Error kind, for aborted runs
    pub error_kind: Option<String>,
    /// Whether the run only read the source
    pub dry_run: bool,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Check if the run succeeded
    pub fn is_success(&self) -> bool {
        self.error_kind.is_none() && (self.dry_run || self.state == RunState::Committed)
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else if secs > 0 {
            format!("{}s", secs)
        } else {
            format!("{}ms", self.duration_ms)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        let state = if self.dry_run && self.error_kind.is_none() {
            "dry run".to_string()
        } else {
            self.state.to_string()
        };
        eprintln!("{} [{}] {}", self.entity, state, self.run_id);
        eprintln!("  {}", self.message);
        if let Some(phase) = self.failed_phase {
            eprintln!("  Failed phase: {phase}");
        }
        eprintln!("  Duration: {}", self.duration_formatted());
    }
}
