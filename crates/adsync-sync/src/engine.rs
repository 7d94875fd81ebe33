//! Sync orchestrator
//!
//! The [`SyncEngine`] composes locking, window calculation, fetching,
//! merging, validation and persistence into the client operations.
//!
//! ## Operation Flow
//!
//! `init`, `append` and `repair` share one pipeline:
//!
//! 1. **Lock**: take `locks/<slug>.lock` (bounded wait)
//! 2. **Fetch**: split the window into chunks, fetch them in ascending order
//! 3. **Merge**: last-write-wins on `(date, campaign_id, data_source)`
//! 4. **Validate**: sampled schema check, never fatal
//! 5. **Write**: dataset, then state; watermark is the last thing to move
//!
//! Any error aborts the operation, releases the lock, writes an error record
//! with a recovery command, and is returned as an [`OperationFailure`].
//! Nothing is retried automatically.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adsync_core::config::{ClientConfig, Config, SyncConfig};
use adsync_core::domain::{
    window::{append_window, backfill_window},
    CampaignRow, ClientSlug, ClientState, DataSource, DatasetRecord, DateRange, ErrorRecord,
    Operation, OperationContext, ValidationReport, SCHEMA_VERSION,
};
use adsync_core::ports::{IClock, IPerformanceSource, IProcessProbe};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::dataset;
use crate::lock::{LockManager, LockStatus};
use crate::merge;
use crate::recovery::ErrorRecorder;
use crate::schema::{self, DatasetSchema};
use crate::state_store::StateStore;
use crate::{OperationFailure, SyncError};

/// Program name used in recovery commands
pub const DEFAULT_PROGRAM: &str = "adsync";

/// Source whose watermark drives the campaign dataset
const CAMPAIGN_SOURCE: DataSource = DataSource::GoogleAds;

// ============================================================================
// Results
// ============================================================================

/// Summary of a successful `init`, `append` or `repair`
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub operation: Operation,
    pub slug: ClientSlug,
    pub range: DateRange,
    pub chunks: usize,
    pub rows_fetched: usize,
    pub total_rows: usize,
    pub duplicates_removed: u64,
    /// Watermark after the operation
    pub watermark: Option<NaiveDate>,
    pub validation: ValidationReport,
    pub date_gaps: Vec<DateRange>,
    pub dataset_path: PathBuf,
}

/// Result of one `validate` check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Missing,
    Invalid,
    Warning,
}

/// A named check performed by `validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl HealthCheck {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

/// Outcome of `validate`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub slug: ClientSlug,
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// `true` when no check is missing or invalid; warnings are tolerated
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.checks
            .iter()
            .all(|c| matches!(c.status, CheckStatus::Ok | CheckStatus::Warning))
    }

    #[must_use]
    pub fn check(&self, name: &str) -> Option<&HealthCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// What the shared pipeline produced
struct MergePass {
    chunks: usize,
    rows_fetched: usize,
    total_rows: usize,
    duplicates_removed: u64,
    validation: ValidationReport,
    date_gaps: Vec<DateRange>,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Per-client sync orchestrator
///
/// ## Dependencies
///
/// - `source`: upstream performance rows
/// - `clock`: "now", from which client-local yesterday is derived
/// - `probe`: process liveness for stale-lock detection
pub struct SyncEngine {
    config: Config,
    source: Arc<dyn IPerformanceSource>,
    clock: Arc<dyn IClock>,
    locks: LockManager,
    states: StateStore,
    recorder: ErrorRecorder,
    program: String,
}

impl SyncEngine {
    pub fn new(
        config: Config,
        source: Arc<dyn IPerformanceSource>,
        clock: Arc<dyn IClock>,
        probe: Arc<dyn IProcessProbe>,
    ) -> Self {
        let locks = LockManager::new(
            config.paths.locks_dir(),
            Duration::from_secs(config.lock.poll_interval_secs),
            probe,
            clock.clone(),
        );
        let states = StateStore::new(config.paths.state_dir());
        let recorder = ErrorRecorder::new(config.paths.errors_dir());

        Self {
            config,
            source,
            clock,
            locks,
            states,
            recorder,
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    /// Program name written into recovery commands
    #[must_use]
    pub fn with_program_name(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn recorder(&self) -> &ErrorRecorder {
        &self.recorder
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Backfill `history_years` of data and replace the dataset
    pub async fn init(&self, slug: &ClientSlug) -> Result<SyncReport, OperationFailure> {
        let mut ctx = OperationContext::default();
        let result = self.run_init(slug, &mut ctx).await;
        self.conclude(Operation::Init, slug, ctx, result).await
    }

    /// Fetch from shortly before the watermark up to yesterday and merge
    pub async fn append(&self, slug: &ClientSlug) -> Result<SyncReport, OperationFailure> {
        let mut ctx = OperationContext::default();
        let result = self.run_append(slug, &mut ctx).await;
        self.conclude(Operation::Append, slug, ctx, result).await
    }

    /// Re-fetch `range` and replace whatever the dataset holds for it
    ///
    /// Idempotent: running the same repair twice leaves an identical dataset.
    /// The watermark is not moved.
    pub async fn repair(
        &self,
        slug: &ClientSlug,
        range: DateRange,
    ) -> Result<SyncReport, OperationFailure> {
        let mut ctx = OperationContext::default();
        let result = self.run_repair(slug, range, &mut ctx).await;
        self.conclude(Operation::Repair, slug, ctx, result).await
    }

    /// Inspect config, state, dataset, schema conformance, gaps and lock
    ///
    /// Read-only. Only failing to take the lock fails the operation; every
    /// other problem is reported as a check.
    pub async fn validate(&self, slug: &ClientSlug) -> Result<HealthReport, OperationFailure> {
        let result = self.run_validate(slug).await;
        self.conclude(Operation::Validate, slug, OperationContext::default(), result)
            .await
    }

    /// Delete the client's lock file regardless of owner
    ///
    /// Returns whether a lock file existed.
    pub async fn force_unlock(&self, slug: &ClientSlug) -> Result<bool, OperationFailure> {
        let result = self.locks.force_unlock(slug).await;
        self.conclude(Operation::ForceUnlock, slug, OperationContext::default(), result)
            .await
    }

    // ------------------------------------------------------------------------
    // Operation bodies
    // ------------------------------------------------------------------------

    async fn run_init(
        &self,
        slug: &ClientSlug,
        ctx: &mut OperationContext,
    ) -> Result<SyncReport, SyncError> {
        set_phase(ctx, "loading");
        let client = self.load_client(slug)?;
        let sync = client.effective_sync(&self.config.sync);
        let tz = client.tz()?;
        let _guard = self
            .locks
            .acquire(slug, self.lock_timeout(), Operation::Init)
            .await?;

        let now = self.clock.now();
        let range = backfill_window(sync.history_years, tz, now);
        ctx.range = Some(range);
        info!(%slug, %range, "starting backfill");

        // A re-init keeps the creation time and nothing else
        let created_at = match self.states.load(slug.as_str()).await {
            Ok(Some(previous)) => previous.created_at,
            Ok(None) => now,
            Err(e) => {
                warn!(%slug, error = %e, "discarding unreadable state");
                now
            }
        };
        let mut state = ClientState::new(slug.clone(), created_at);

        let pass = self
            .sync_range(slug, &client, &sync, Vec::new(), range, ctx)
            .await?;

        set_phase(ctx, "updating_state");
        apply_pass(&mut state, &client, &pass, now);
        state.reset_watermark(CAMPAIGN_SOURCE, range.end, now);
        self.states.save(&state).await?;

        Ok(self.report(Operation::Init, slug, range, pass, &state))
    }

    async fn run_append(
        &self,
        slug: &ClientSlug,
        ctx: &mut OperationContext,
    ) -> Result<SyncReport, SyncError> {
        set_phase(ctx, "loading");
        let client = self.load_client(slug)?;
        let sync = client.effective_sync(&self.config.sync);
        let tz = client.tz()?;
        let _guard = self
            .locks
            .acquire(slug, self.lock_timeout(), Operation::Append)
            .await?;

        let (mut state, existing) = self.load_prior(slug).await?;
        let now = self.clock.now();
        let range = append_window(
            state.watermark(CAMPAIGN_SOURCE),
            sync.overlap_days,
            sync.max_window_days,
            tz,
            now,
        );
        ctx.range = Some(range);
        info!(%slug, %range, watermark = ?state.watermark(CAMPAIGN_SOURCE), "starting append");

        let pass = self
            .sync_range(slug, &client, &sync, existing, range, ctx)
            .await?;

        set_phase(ctx, "updating_state");
        apply_pass(&mut state, &client, &pass, now);
        state.data_quality.last_append = Some(now);
        let watermark = state.advance_watermark(CAMPAIGN_SOURCE, range.end, now);
        self.states.save(&state).await?;
        debug!(%slug, %watermark, "watermark advanced");

        Ok(self.report(Operation::Append, slug, range, pass, &state))
    }

    async fn run_repair(
        &self,
        slug: &ClientSlug,
        range: DateRange,
        ctx: &mut OperationContext,
    ) -> Result<SyncReport, SyncError> {
        if range.is_empty() {
            return Err(SyncError::InvalidInput(format!(
                "repair range {range} ends before it starts"
            )));
        }
        ctx.range = Some(range);

        set_phase(ctx, "loading");
        let client = self.load_client(slug)?;
        let sync = client.effective_sync(&self.config.sync);
        let _guard = self
            .locks
            .acquire(slug, self.lock_timeout(), Operation::Repair)
            .await?;

        let (mut state, existing) = self.load_prior(slug).await?;
        let kept = merge::remove_range(existing, CAMPAIGN_SOURCE, range);
        info!(%slug, %range, "starting repair");

        let pass = self.sync_range(slug, &client, &sync, kept, range, ctx).await?;

        set_phase(ctx, "updating_state");
        apply_pass(&mut state, &client, &pass, self.clock.now());
        self.states.save(&state).await?;

        Ok(self.report(Operation::Repair, slug, range, pass, &state))
    }

    async fn run_validate(&self, slug: &ClientSlug) -> Result<HealthReport, SyncError> {
        // Observed before we take the lock ourselves
        let lock_check = self.lock_check(slug).await;
        let _guard = self
            .locks
            .acquire(slug, self.lock_timeout(), Operation::Validate)
            .await?;

        let mut checks = vec![self.config_check(slug).await, self.state_check(slug).await];

        let dataset_path = self.config.paths.dataset_path(slug);
        match dataset::load(&dataset_path).await {
            Ok(Some(rows)) => {
                checks.push(dataset_check(&rows));
                let report = self.validate_rows(&rows).await;
                checks.push(schema_check(&report));
                checks.push(gaps_check(&merge::date_gaps(&rows, CAMPAIGN_SOURCE)));
            }
            Ok(None) => {
                let detail = format!("{} not found", dataset_path.display());
                checks.push(HealthCheck::new("dataset", CheckStatus::Missing, detail));
                checks.push(HealthCheck::new("schema", CheckStatus::Missing, "no dataset"));
                checks.push(HealthCheck::new("date_gaps", CheckStatus::Missing, "no dataset"));
            }
            Err(e) => {
                checks.push(HealthCheck::new("dataset", CheckStatus::Invalid, e.to_string()));
                checks.push(HealthCheck::new("schema", CheckStatus::Missing, "dataset unreadable"));
                checks.push(HealthCheck::new("date_gaps", CheckStatus::Missing, "dataset unreadable"));
            }
        }
        checks.push(lock_check);

        let report = HealthReport {
            slug: slug.clone(),
            checks,
        };
        for check in &report.checks {
            debug!(%slug, check = check.name, status = ?check.status, detail = %check.detail, "validate");
        }
        info!(%slug, healthy = report.is_healthy(), "validation finished");
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    /// Fetch `range` in chunks, merge into `existing`, validate and write
    async fn sync_range(
        &self,
        slug: &ClientSlug,
        client: &ClientConfig,
        sync: &SyncConfig,
        existing: Vec<CampaignRow>,
        range: DateRange,
        ctx: &mut OperationContext,
    ) -> Result<MergePass, SyncError> {
        let chunks = range.chunk(sync.chunk_days);
        let mut fetched = Vec::new();

        set_phase(ctx, "fetching");
        for chunk in &chunks {
            let mut rows = self
                .source
                .fetch(&client.customer_id, *chunk)
                .await
                .map_err(|e| SyncError::FetchFailure {
                    range: *chunk,
                    message: format!("{e:#}"),
                })?;
            debug!(%slug, %chunk, rows = rows.len(), "chunk fetched");
            for row in &mut rows {
                row.enrich(&client.currency_code, SCHEMA_VERSION);
            }
            fetched.append(&mut rows);
        }
        let rows_fetched = fetched.len();

        set_phase(ctx, "merging");
        let outcome = merge::merge_rows(existing, fetched, CampaignRow::key);
        debug!(
            %slug,
            rows = outcome.rows.len(),
            duplicates_removed = outcome.duplicates_removed,
            "merged"
        );

        set_phase(ctx, "validating");
        let validation = self.validate_rows(&outcome.rows).await;
        let date_gaps = merge::date_gaps(&outcome.rows, CAMPAIGN_SOURCE);
        if !date_gaps.is_empty() {
            warn!(%slug, gaps = date_gaps.len(), "dataset has date gaps");
        }

        set_phase(ctx, "writing");
        dataset::save(&self.config.paths.dataset_path(slug), &outcome.rows).await?;

        info!(
            %slug,
            chunks = chunks.len(),
            rows_fetched,
            total_rows = outcome.rows.len(),
            "dataset written"
        );

        Ok(MergePass {
            chunks: chunks.len(),
            rows_fetched,
            total_rows: outcome.rows.len(),
            duplicates_removed: outcome.duplicates_removed,
            validation,
            date_gaps,
        })
    }

    async fn validate_rows(&self, rows: &[CampaignRow]) -> ValidationReport {
        let path = self.config.paths.campaign_schema_path();
        match DatasetSchema::load_or_builtin(&path).await {
            Ok(schema) => schema::validate(
                rows,
                &schema,
                self.config.validation.sample_size,
                self.config.validation.max_errors,
            ),
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "cannot load schema");
                ValidationReport {
                    ok: false,
                    rows_checked: 0,
                    errors: vec![format!("cannot load schema {}: {e:#}", path.display())],
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.config.lock.timeout_secs)
    }

    fn load_client(&self, slug: &ClientSlug) -> Result<ClientConfig, SyncError> {
        let path = self.config.paths.client_config_path(slug);
        let client = ClientConfig::load(&path).map_err(|e| SyncError::Config {
            path: path.clone(),
            reason: format!("{e:#}"),
        })?;

        let errors = client.validate(&self.config.sync);
        if !errors.is_empty() {
            let reason = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SyncError::Config { path, reason });
        }
        Ok(client)
    }

    /// State and dataset from a previous `init`; both must exist
    async fn load_prior(
        &self,
        slug: &ClientSlug,
    ) -> Result<(ClientState, Vec<CampaignRow>), SyncError> {
        let state = self
            .states
            .load(slug.as_str())
            .await?
            .ok_or_else(|| SyncError::MissingPriorState {
                slug: slug.clone(),
                path: self.states.path_for(slug.as_str()),
            })?;

        let dataset_path = self.config.paths.dataset_path(slug);
        let rows = dataset::load(&dataset_path)
            .await?
            .ok_or_else(|| SyncError::MissingPriorState {
                slug: slug.clone(),
                path: dataset_path.clone(),
            })?;

        Ok((state, rows))
    }

    fn report(
        &self,
        operation: Operation,
        slug: &ClientSlug,
        range: DateRange,
        pass: MergePass,
        state: &ClientState,
    ) -> SyncReport {
        SyncReport {
            operation,
            slug: slug.clone(),
            range,
            chunks: pass.chunks,
            rows_fetched: pass.rows_fetched,
            total_rows: pass.total_rows,
            duplicates_removed: pass.duplicates_removed,
            watermark: state.watermark(CAMPAIGN_SOURCE),
            validation: pass.validation,
            date_gaps: pass.date_gaps,
            dataset_path: self.config.paths.dataset_path(slug),
        }
    }

    /// Write the error record for a failed operation and wrap the error
    async fn conclude<T>(
        &self,
        operation: Operation,
        slug: &ClientSlug,
        ctx: OperationContext,
        result: Result<T, SyncError>,
    ) -> Result<T, OperationFailure> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let record = ErrorRecord::new(
            &self.program,
            operation,
            slug.clone(),
            err.kind(),
            err.to_string(),
            ctx.clone(),
            self.clock.now(),
        );
        let record_path = match self.recorder.record(&record).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!(%slug, error = %format!("{e:#}"), "failed to write error record");
                None
            }
        };

        Err(OperationFailure {
            operation,
            slug: slug.clone(),
            range: ctx.range,
            error: err,
            record_path,
        })
    }

    // ------------------------------------------------------------------------
    // Validate checks
    // ------------------------------------------------------------------------

    async fn lock_check(&self, slug: &ClientSlug) -> HealthCheck {
        match self.locks.status(slug).await {
            LockStatus::Free => HealthCheck::new("lock", CheckStatus::Ok, "not locked"),
            LockStatus::Held(owner) => HealthCheck::new(
                "lock",
                CheckStatus::Warning,
                format!(
                    "held by pid {} ({}) since {}",
                    owner.pid,
                    owner.operation,
                    format_instant(owner.acquired_at)
                ),
            ),
            LockStatus::Stale(owner) => HealthCheck::new(
                "lock",
                CheckStatus::Warning,
                format!("stale lock left by pid {} ({})", owner.pid, owner.operation),
            ),
            LockStatus::Unreadable => {
                HealthCheck::new("lock", CheckStatus::Warning, "lock file present but unreadable")
            }
        }
    }

    async fn config_check(&self, slug: &ClientSlug) -> HealthCheck {
        let global = self.config.validate();
        if !global.is_empty() {
            let detail = global
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return HealthCheck::new("config", CheckStatus::Invalid, detail);
        }

        let path = self.config.paths.client_config_path(slug);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return HealthCheck::new(
                "config",
                CheckStatus::Missing,
                format!("{} not found", path.display()),
            );
        }
        match self.load_client(slug) {
            Ok(client) => HealthCheck::new(
                "config",
                CheckStatus::Ok,
                format!("customer {} in {}", client.customer_id, client.timezone),
            ),
            Err(e) => HealthCheck::new("config", CheckStatus::Invalid, e.to_string()),
        }
    }

    async fn state_check(&self, slug: &ClientSlug) -> HealthCheck {
        match self.states.load(slug.as_str()).await {
            Ok(Some(state)) => match state.watermark(CAMPAIGN_SOURCE) {
                Some(watermark) => HealthCheck::new(
                    "state",
                    CheckStatus::Ok,
                    format!("watermark {watermark}, last updated {}", format_instant(state.last_updated)),
                ),
                None => HealthCheck::new("state", CheckStatus::Warning, "no watermark recorded"),
            },
            Ok(None) => HealthCheck::new(
                "state",
                CheckStatus::Missing,
                format!("{} not found", self.states.path_for(slug.as_str()).display()),
            ),
            Err(e) => HealthCheck::new("state", CheckStatus::Invalid, e.to_string()),
        }
    }
}

fn dataset_check(rows: &[CampaignRow]) -> HealthCheck {
    let mut seen = HashSet::with_capacity(rows.len());
    let duplicates = rows.iter().filter(|row| !seen.insert(row.key())).count();
    if duplicates > 0 {
        HealthCheck::new(
            "dataset",
            CheckStatus::Invalid,
            format!("{duplicates} rows share a (date, campaign_id, data_source) key"),
        )
    } else {
        HealthCheck::new("dataset", CheckStatus::Ok, format!("{} rows", rows.len()))
    }
}

fn schema_check(report: &ValidationReport) -> HealthCheck {
    if report.ok {
        HealthCheck::new(
            "schema",
            CheckStatus::Ok,
            format!("{} rows checked", report.rows_checked),
        )
    } else {
        HealthCheck::new("schema", CheckStatus::Warning, report.errors.join("; "))
    }
}

fn gaps_check(gaps: &[DateRange]) -> HealthCheck {
    if gaps.is_empty() {
        return HealthCheck::new("date_gaps", CheckStatus::Ok, "no gaps");
    }
    let listed = gaps.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    HealthCheck::new(
        "date_gaps",
        CheckStatus::Warning,
        format!("{} gap(s): {listed}", gaps.len()),
    )
}

fn apply_pass(state: &mut ClientState, client: &ClientConfig, pass: &MergePass, now: DateTime<Utc>) {
    state.timezone = Some(client.timezone.clone());
    state.currency_code = Some(client.currency_code.clone());
    state.schema_version = SCHEMA_VERSION;
    state.last_updated = now;

    let quality = &mut state.data_quality;
    quality.total_rows = pass.total_rows as u64;
    quality.duplicate_rows_removed += pass.duplicates_removed;
    quality.date_gaps = pass.date_gaps.clone();
    quality.last_validation_at = Some(now);
    quality.last_validation = Some(pass.validation.clone());
}

fn set_phase(ctx: &mut OperationContext, phase: &str) {
    ctx.phase = Some(phase.to_string());
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
