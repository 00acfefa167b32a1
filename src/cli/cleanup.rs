use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Color, Table};

use super::OutputFormat;
use crate::engine::cleanup::CleanupReport;
use crate::engine::Engine;

/// Report every reference a decommissioned repository left behind.
/// Read-only; returns 1 while anything still references the repository.
pub async fn handle_cleanup(engine: &Engine, repository: &str, output: OutputFormat) -> Result<i32> {
    let report = engine
        .cleanup(repository)
        .await
        .with_context(|| format!("Failed to search for references to '{}'", repository))?;

    match output {
        OutputFormat::Json => super::print_json(&report)?,
        OutputFormat::Table => print!("{}", render(&report)),
    }
    Ok(if report.is_clean() { 0 } else { 1 })
}

fn render(report: &CleanupReport) -> String {
    let mut out = format!(
        "Stale references to {}\nPrincipal: {}\n",
        report.repository, report.principal
    );

    if report.bindings.is_empty() {
        out.push_str("\nNo bindings grant the stale principal.\n");
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("RESOURCE").add_attribute(Attribute::Bold),
                Cell::new("ROLE").add_attribute(Attribute::Bold),
                Cell::new("REMOVE WITH").add_attribute(Attribute::Bold),
            ]);
        for binding in &report.bindings {
            table.add_row(vec![
                Cell::new(binding.scope.to_string()),
                Cell::new(&binding.role),
                Cell::new(&binding.command),
            ]);
        }
        out.push_str("\nBindings still granting the stale principal:\n");
        out.push_str(&table.to_string());
        out.push('\n');
    }

    if !report.providers.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("PROVIDER").add_attribute(Attribute::Bold),
                Cell::new("ADMITS").add_attribute(Attribute::Bold),
                Cell::new("CONDITION").add_attribute(Attribute::Bold),
            ]);
        for provider in &report.providers {
            let admits = match provider.admits {
                Some(true) => Cell::new("yes").fg(Color::Red),
                Some(false) => Cell::new("no").fg(Color::Green),
                None => Cell::new("unknown").fg(Color::Yellow),
            };
            table.add_row(vec![
                Cell::new(&provider.provider_id),
                admits,
                Cell::new(provider.condition.as_deref().unwrap_or("(none)")),
            ]);
        }
        out.push_str("\nProviders:\n");
        out.push_str(&table.to_string());
        out.push('\n');
    }

    for u in &report.unverifiable {
        out.push_str(&format!("\nCould not check {} '{}': {}\n", u.kind, u.name, u.error));
    }

    if report.is_clean() {
        out.push_str("\nNothing references the repository any more.\n");
    }
    out
}
