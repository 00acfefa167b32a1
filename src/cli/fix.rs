use anyhow::{Context, Result};
use clap::Args;

use super::OutputFormat;
use crate::engine::confirm::{Confirm, DenyAll, PreApproved, TerminalConfirm};
use crate::engine::plan::FixScope;
use crate::engine::Engine;

#[derive(Args, Debug, Clone)]
pub struct FixArgs {
    /// Which findings to remediate
    #[arg(long, value_enum, default_value_t = FixScope::All)]
    pub scope: FixScope,
    /// Print the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Run destructive actions without asking
    #[arg(long, conflicts_with = "non_interactive")]
    pub approve_deletions: bool,
    /// Decline every destructive action instead of asking
    #[arg(long)]
    pub non_interactive: bool,
    /// Skip all remaining actions after the first failure
    #[arg(long)]
    pub stop_on_failure: bool,
}

impl FixArgs {
    fn confirm(&self) -> Box<dyn Confirm> {
        if self.approve_deletions {
            Box::new(PreApproved)
        } else if self.non_interactive {
            Box::new(DenyAll)
        } else {
            Box::new(TerminalConfirm)
        }
    }
}

/// Audit, remediate and re-verify. Returns the exit code.
pub async fn handle_fix(engine: &Engine, args: &FixArgs, output: OutputFormat) -> Result<i32> {
    let confirm = args.confirm();
    let outcome = engine
        .fix(args.scope, confirm.as_ref(), args.dry_run)
        .await
        .context("Remediation could not be completed")?;
    let report = engine.fix_report(&outcome);

    match output {
        OutputFormat::Json => super::print_json(&report)?,
        OutputFormat::Table => {
            print!("{}", report.render());
            if outcome.dry_run && !outcome.plan.is_empty() {
                println!("\nDry run: nothing was changed. Re-run without --dry-run to apply.");
                if outcome.plan.has_destructive_steps() && !args.approve_deletions {
                    println!(
                        "Destructive steps ask for confirmation. Pass --approve-deletions to run them unattended."
                    );
                }
            }
        }
    }
    Ok(report.exit_code())
}
