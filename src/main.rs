use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod engine;
mod gcp;
mod settings;

use cli::{check_config, cleanup, fix, scheduler, verify, OutputFormat};
use engine::executor::FailurePolicy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use instead of the layered config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit the live trust chain against the configuration
    #[command(visible_alias = "v")]
    Verify,
    /// Audit, remediate and re-verify the trust chain
    #[command(visible_alias = "f")]
    Fix(fix::FixArgs),
    /// Find bindings and providers still referencing a decommissioned repository
    #[command(visible_alias = "c")]
    Cleanup {
        /// Repository (owner/name) that is no longer declared
        #[arg(long)]
        stale_repository: String,
    },
    /// Diagnose how the scheduler job authenticates against its target service
    #[command(visible_alias = "s")]
    Scheduler,
    /// Load and validate the configuration without contacting Google Cloud
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries the report
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = cli::load_settings(cli.config.as_deref())?;

    let code = match &cli.command {
        Commands::CheckConfig => check_config::handle_check_config(&settings, cli.output)?,
        Commands::Verify => {
            let engine = cli::connect(&settings, settings.engine.failure_policy).await?;
            verify::handle_verify(&engine, cli.output).await?
        }
        Commands::Fix(args) => {
            let policy = if args.stop_on_failure {
                FailurePolicy::StopOnFirstFailure
            } else {
                settings.engine.failure_policy
            };
            let engine = cli::connect(&settings, policy).await?;
            fix::handle_fix(&engine, args, cli.output).await?
        }
        Commands::Cleanup { stale_repository } => {
            let engine = cli::connect(&settings, settings.engine.failure_policy).await?;
            cleanup::handle_cleanup(&engine, stale_repository, cli.output).await?
        }
        Commands::Scheduler => {
            let engine = cli::connect(&settings, settings.engine.failure_policy).await?;
            scheduler::handle_scheduler(&engine, cli.output).await?
        }
    };

    std::process::exit(code);
}
