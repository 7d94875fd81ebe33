//! `adsync validate <slug>`: read-only health check of one client
//!
//! Exits non-zero when any check is missing or invalid, so schedulers can
//! alert on it. Warnings (gaps, schema drift, stale locks) keep exit code 0.

use adsync_sync::engine::HealthReport;
use anyhow::{bail, Result};
use clap::Args;

use super::{parse_slug, render_failure, CommandContext};
use crate::output::{OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Client slug
    pub slug: String,
}

impl ValidateCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let slug = parse_slug(&self.slug)?;
        let engine = ctx.engine(false)?;

        let report = engine
            .validate(&slug)
            .await
            .map_err(|failure| render_failure(ctx, failure))?;

        let formatter = ctx.formatter();
        if ctx.format == OutputFormat::Json {
            formatter.print_json(&serde_json::json!({
                "success": report.is_healthy(),
                "report": serde_json::to_value(&report)?,
            }));
        } else {
            print_checks(formatter.as_ref(), &report);
        }

        if !report.is_healthy() {
            bail!("client '{slug}' failed validation");
        }
        Ok(())
    }
}

fn print_checks(formatter: &dyn OutputFormatter, report: &HealthReport) {
    for check in &report.checks {
        formatter.check(check);
    }
    if report.is_healthy() {
        formatter.info(&format!("{} looks healthy", report.slug));
    }
}
