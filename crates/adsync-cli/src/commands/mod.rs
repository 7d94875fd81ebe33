//! CLI subcommands
//!
//! Every command follows the same shape: parse arguments, build a
//! [`SyncEngine`] from the loaded [`Config`], run one engine operation and
//! render its result. Failures are rendered with the path of their error
//! record and the command that resumes the work.

pub mod append;
pub mod force_unlock;
pub mod init;
pub mod repair;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adsync_api::{client::ReportingClient, ApiError};
use adsync_core::config::Config;
use adsync_core::domain::{
    error_record::recovery_command, ClientSlug, OperationContext,
};
use adsync_sync::engine::{SyncEngine, SyncReport, DEFAULT_PROGRAM};
use adsync_sync::system::{SystemClock, SystemProcessProbe};
use adsync_sync::OperationFailure;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

// ============================================================================
// Shared command context
// ============================================================================

/// Everything a subcommand needs besides its own arguments
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    /// Build an engine wired to the reporting API and the host system
    ///
    /// Operations that never fetch (`validate`, `force-unlock`) tolerate a
    /// missing API token.
    pub fn engine(&self, fetches: bool) -> Result<SyncEngine> {
        let problems = self.config.validate();
        if !problems.is_empty() {
            let list: Vec<String> = problems.iter().map(ToString::to_string).collect();
            bail!("invalid configuration: {}", list.join("; "));
        }

        let client = match ReportingClient::from_config(&self.config.api) {
            Ok(client) => client,
            Err(ApiError::MissingToken(var)) if !fetches => {
                debug!(token_env = %var, "no API token; engine will not fetch");
                ReportingClient::with_base_url(String::new(), self.config.api.base_url.clone())
            }
            Err(e) => return Err(e).context("configuring the reporting API client"),
        };
        info!(base_url = %client.base_url(), root = %self.config.paths.root.display(), "engine ready");

        Ok(SyncEngine::new(
            self.config.clone(),
            Arc::new(client),
            Arc::new(SystemClock),
            Arc::new(SystemProcessProbe),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Load the global configuration
///
/// An explicit `--config` must exist and parse. Without one, the default
/// location is used when present and built-in defaults otherwise. `root`
/// overrides `paths.root` either way.
pub fn load_config(explicit: Option<&Path>, root: Option<PathBuf>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => {
            let path = Config::default_path();
            if path.exists() {
                Config::load(&path)
                    .with_context(|| format!("loading configuration from {}", path.display()))?
            } else {
                Config::default()
            }
        }
    };
    if let Some(root) = root {
        config.paths.root = root;
    }
    Ok(config)
}

pub fn parse_slug(raw: &str) -> Result<ClientSlug> {
    ClientSlug::new(raw).with_context(|| format!("'{raw}' is not a valid client slug"))
}

/// Print a successful sync and surface its non-fatal warnings
pub fn render_sync_report(ctx: &CommandContext, report: &SyncReport) -> Result<()> {
    let formatter = ctx.formatter();

    if ctx.format == OutputFormat::Json {
        let value = serde_json::json!({
            "success": true,
            "report": serde_json::to_value(report)?,
        });
        formatter.print_json(&value);
        return Ok(());
    }

    formatter.success(&format!(
        "{} {}: {}",
        report.operation, report.slug, report.range
    ));
    formatter.field("Chunks fetched", &report.chunks.to_string());
    formatter.field("Rows fetched", &report.rows_fetched.to_string());
    formatter.field("Total rows", &report.total_rows.to_string());
    formatter.field("Duplicates removed", &report.duplicates_removed.to_string());
    let watermark = report
        .watermark
        .map_or_else(|| "(none)".to_string(), |w| w.to_string());
    formatter.field("Watermark", &watermark);
    formatter.field("Dataset", &report.dataset_path.display().to_string());

    if !report.validation.ok {
        formatter.warn(&format!(
            "schema validation found {} problem(s) in {} sampled rows",
            report.validation.errors.len(),
            report.validation.rows_checked
        ));
        for message in &report.validation.errors {
            formatter.info(message);
        }
    }
    if !report.date_gaps.is_empty() {
        let gaps: Vec<String> = report.date_gaps.iter().map(ToString::to_string).collect();
        formatter.warn(&format!("dataset has date gaps: {}", gaps.join(", ")));
    }
    Ok(())
}

/// Print an operation failure and turn it into the command's error
pub fn render_failure(ctx: &CommandContext, failure: OperationFailure) -> anyhow::Error {
    let formatter = ctx.formatter();
    let context = OperationContext {
        range: failure.range,
        phase: None,
    };
    let recovery = recovery_command(
        DEFAULT_PROGRAM,
        failure.operation,
        &failure.slug,
        failure.kind(),
        &context,
    );

    if ctx.format == OutputFormat::Json {
        formatter.print_json(&serde_json::json!({
            "success": false,
            "operation": failure.operation,
            "slug": failure.slug,
            "error_kind": failure.kind(),
            "error": error_chain(&failure.error),
            "record_path": failure.record_path,
            "recovery_command": recovery,
        }));
    } else {
        formatter.error(&format!("{}: {}", failure, error_chain(&failure.error)));
        match &failure.record_path {
            Some(path) => formatter.field("Error record", &path.display().to_string()),
            None => formatter.warn("the error record could not be written"),
        }
        formatter.field("To recover, run", &recovery);
    }

    anyhow::Error::new(failure)
}

/// `outer: inner: root` for an error and its sources
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}
