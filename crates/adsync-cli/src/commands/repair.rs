//! `adsync repair <slug> --start <date> --end <date>`
//!
//! Re-fetches an explicit inclusive date range and replaces what the dataset
//! holds for it. Used to fill gaps and to resume failed appends.

use adsync_core::domain::DateRange;
use anyhow::{Context, Result};
use clap::Args;

use super::{parse_slug, render_failure, render_sync_report, CommandContext};

#[derive(Debug, Args)]
pub struct RepairCommand {
    /// Client slug
    pub slug: String,

    /// First day to re-fetch (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// Last day to re-fetch, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,
}

impl RepairCommand {
    pub fn range(&self) -> Result<DateRange> {
        DateRange::parse(&self.start, &self.end)
            .with_context(|| format!("invalid repair range {}..{}", self.start, self.end))
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let slug = parse_slug(&self.slug)?;
        let range = self.range()?;
        let engine = ctx.engine(true)?;

        let report = engine
            .repair(&slug, range)
            .await
            .map_err(|failure| render_failure(ctx, failure))?;
        render_sync_report(ctx, &report)
    }
}
