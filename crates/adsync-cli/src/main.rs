//! adsync CLI - Incremental ad-performance sync
//!
//! Provides commands for:
//! - Backfilling a client's history (`init`)
//! - Incremental daily sync (`append`)
//! - Re-fetching an explicit date range (`repair`)
//! - Read-only health checks (`validate`)
//! - Clearing a stuck lock (`force-unlock`)
//!
//! Exit status is 0 on success and 1 on any failure, including a
//! `validate` that finds missing or invalid pieces.

use std::path::PathBuf;
use std::process::ExitCode;

use adsync_core::config::Config;
use adsync_sync::OperationFailure;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    append::AppendCommand, force_unlock::ForceUnlockCommand, init::InitCommand,
    load_config, repair::RepairCommand, validate::ValidateCommand, CommandContext,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "adsync",
    version,
    about = "Incremental ad-performance sync into per-client datasets"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data root (`paths.root`)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Backfill full history and replace the client's dataset
    Init(InitCommand),
    /// Fetch new days since the watermark and merge them in
    Append(AppendCommand),
    /// Re-fetch an explicit date range and replace it in the dataset
    Repair(RepairCommand),
    /// Check config, state, dataset, schema, gaps and lock for a client
    Validate(ValidateCommand),
    /// Remove a client's lock file regardless of owner
    ForceUnlock(ForceUnlockCommand),
}

impl Cli {
    /// Filter directive: `-q`/`-v` win over `logging.level`
    fn log_filter(&self, config: &Config) -> String {
        match (self.quiet, self.verbose) {
            (_, 1) => "debug".to_string(),
            (_, v) if v >= 2 => "trace".to_string(),
            (true, _) => "error".to_string(),
            _ => config.logging.level.clone(),
        }
    }
}

fn init_tracing(filter: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: &Cli, config: Config) -> Result<()> {
    let ctx = CommandContext {
        config,
        format: OutputFormat::from_flag(cli.json),
        quiet: cli.quiet,
    };

    match &cli.command {
        Commands::Init(cmd) => cmd.execute(&ctx).await,
        Commands::Append(cmd) => cmd.execute(&ctx).await,
        Commands::Repair(cmd) => cmd.execute(&ctx).await,
        Commands::Validate(cmd) => cmd.execute(&ctx).await,
        Commands::ForceUnlock(cmd) => cmd.execute(&ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let formatter = get_formatter(OutputFormat::from_flag(cli.json), cli.quiet);

    let config = match load_config(cli.config.as_deref(), cli.root.clone()) {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&cli.log_filter(&config), config.logging.format == "json");

    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Operation failures were already rendered with their recovery hint
            if e.downcast_ref::<OperationFailure>().is_none() {
                formatter.error(&format!("{e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}
