//! `adsync init <slug>`: backfill a client's history and replace its dataset

use anyhow::Result;
use clap::Args;

use super::{parse_slug, render_failure, render_sync_report, CommandContext};

#[derive(Debug, Args)]
pub struct InitCommand {
    /// Client slug, as in `configs/clients/<slug>.yaml`
    pub slug: String,
}

impl InitCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let slug = parse_slug(&self.slug)?;
        let engine = ctx.engine(true)?;

        let report = engine
            .init(&slug)
            .await
            .map_err(|failure| render_failure(ctx, failure))?;
        render_sync_report(ctx, &report)
    }
}
