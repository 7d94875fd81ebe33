//! `adsync force-unlock <slug>`: remove a client's lock file unconditionally
//!
//! Intended for locks left behind by a crashed run on hosts where stale-lock
//! detection cannot see the owning process.

use anyhow::Result;
use clap::Args;

use super::{parse_slug, render_failure, CommandContext};
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct ForceUnlockCommand {
    /// Client slug
    pub slug: String,
}

impl ForceUnlockCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let slug = parse_slug(&self.slug)?;
        let engine = ctx.engine(false)?;

        let removed = engine
            .force_unlock(&slug)
            .await
            .map_err(|failure| render_failure(ctx, failure))?;

        let formatter = ctx.formatter();
        if ctx.format == OutputFormat::Json {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "slug": slug,
                "removed": removed,
            }));
        } else if removed {
            formatter.success(&format!("Lock removed for {slug}"));
        } else {
            formatter.success(&format!("No lock held for {slug}"));
        }
        Ok(())
    }
}
