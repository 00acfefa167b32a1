use anyhow::{Context, Result};

use super::OutputFormat;
use crate::engine::Engine;

/// Audit the trust chain and print the report. Returns the exit code.
pub async fn handle_verify(engine: &Engine, output: OutputFormat) -> Result<i32> {
    let report = engine
        .verify()
        .await
        .context("Audit could not be completed")?;

    match output {
        OutputFormat::Json => super::print_json(&report)?,
        OutputFormat::Table => print!("{}", report.render()),
    }
    Ok(report.exit_code())
}
