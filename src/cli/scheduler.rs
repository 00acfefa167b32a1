use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Color, Table};

use super::OutputFormat;
use crate::engine::scheduler::SchedulerDiagnosis;
use crate::engine::Engine;

pub async fn handle_scheduler(engine: &Engine, output: OutputFormat) -> Result<i32> {
    let Some(diagnosis) = engine
        .diagnose_scheduler()
        .await
        .context("Scheduler diagnosis could not be completed")?
    else {
        eprintln!("No scheduler job is configured.");
        return Ok(0);
    };

    match output {
        OutputFormat::Json => super::print_json(&diagnosis)?,
        OutputFormat::Table => print!("{}", render(&diagnosis)),
    }

    let healthy = diagnosis.error.is_none()
        && diagnosis.subject_can_invoke
        && diagnosis.agent_can_mint_tokens
        && diagnosis.findings.is_empty();
    Ok(if healthy { 0 } else { 1 })
}

fn yes_no(value: bool) -> Cell {
    if value {
        Cell::new("yes").fg(Color::Green)
    } else {
        Cell::new("no").fg(Color::Red).add_attribute(Attribute::Bold)
    }
}

fn render(d: &SchedulerDiagnosis) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("FIELD").add_attribute(Attribute::Bold),
            Cell::new("VALUE").add_attribute(Attribute::Bold),
        ]);

    let missing = "-";
    table.add_row(vec![Cell::new("Job"), Cell::new(format!("{} ({})", d.job, d.region))]);
    table.add_row(vec![
        Cell::new("HTTP method"),
        Cell::new(d.http_method.as_deref().unwrap_or(missing)),
    ]);
    table.add_row(vec![Cell::new("URI"), Cell::new(d.uri.as_deref().unwrap_or(missing))]);
    table.add_row(vec![
        Cell::new("OIDC subject"),
        Cell::new(d.subject.as_deref().unwrap_or(missing)),
    ]);
    table.add_row(vec![
        Cell::new("OIDC audience"),
        Cell::new(d.audience.as_deref().unwrap_or(missing)),
    ]);
    table.add_row(vec![
        Cell::new("Schedule"),
        Cell::new(d.schedule.as_deref().unwrap_or(missing)),
    ]);
    table.add_row(vec![
        Cell::new("Time zone"),
        Cell::new(d.time_zone.as_deref().unwrap_or(missing)),
    ]);
    table.add_row(vec![
        Cell::new("Target service"),
        match &d.target_service {
            Some(service) => Cell::new(service),
            None => Cell::new("unresolved").fg(Color::Red),
        },
    ]);
    table.add_row(vec![Cell::new("Subject can invoke target"), yes_no(d.subject_can_invoke)]);
    table.add_row(vec![
        Cell::new("Scheduler agent can mint tokens"),
        yes_no(d.agent_can_mint_tokens),
    ]);

    let mut out = format!("Scheduler job {}\n{}\n", d.job, table);
    if let Some(error) = &d.error {
        out.push_str(&format!("\nJob could not be inspected: {}\n", error));
    }
    for finding in &d.findings {
        out.push_str(&format!("\n[{}] {}\n  hint: {}\n", finding.severity(), finding, finding.hint()));
    }
    out
}
