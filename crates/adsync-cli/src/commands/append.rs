//! `adsync append <slug>`: fetch from just before the watermark to yesterday

use anyhow::Result;
use clap::Args;

use super::{parse_slug, render_failure, render_sync_report, CommandContext};

#[derive(Debug, Args)]
pub struct AppendCommand {
    /// Client slug
    pub slug: String,
}

impl AppendCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let slug = parse_slug(&self.slug)?;
        let engine = ctx.engine(true)?;

        let report = engine
            .append(&slug)
            .await
            .map_err(|failure| render_failure(ctx, failure))?;
        render_sync_report(ctx, &report)
    }
}
