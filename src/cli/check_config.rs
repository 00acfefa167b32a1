use anyhow::Result;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};
use serde_json::json;

use super::OutputFormat;
use crate::engine::config::TrustConfig;
use crate::settings::Settings;

/// Print the declared configuration as the engine will see it. No network access.
pub fn handle_check_config(settings: &Settings, output: OutputFormat) -> Result<i32> {
    let config = settings.trust_config();

    match output {
        OutputFormat::Json => super::print_json(&json!({
            "project_id": config.project_id,
            "region": config.region,
            "service_account": config.service_account_email(),
            "roles": config.service_account.roles,
            "pool": config.federation.pool_id,
            "provider": config.federation.provider_id,
            "issuer_uri": config.federation.issuer_uri,
            "repositories": config.federation.repositories,
            "secret": config.secret.name,
            "secret_accessors": secret_accessors(&config),
            "services": config.services,
            "scheduler_job": config.scheduler.as_ref().map(|s| &s.job),
            "scheduler_subject": config.scheduler_subject(),
            "failure_policy": settings.engine.failure_policy,
        }))?,
        OutputFormat::Table => print!("{}", render(&config)),
    }
    Ok(0)
}

/// The CI account always reads the secret
fn secret_accessors(config: &TrustConfig) -> Vec<String> {
    let mut accessors = vec![config.service_account_email()];
    for email in &config.secret.accessors {
        if !accessors.contains(email) {
            accessors.push(email.clone());
        }
    }
    accessors
}

fn render(config: &TrustConfig) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("SETTING").add_attribute(Attribute::Bold),
            Cell::new("VALUE").add_attribute(Attribute::Bold),
        ]);

    let rows = [
        ("Project", format!("{} ({})", config.project_id, config.region)),
        ("Service account", config.service_account_email()),
        ("Roles", config.service_account.roles.join("\n")),
        (
            "Pool / provider",
            format!(
                "{} / {}",
                config.federation.pool_id, config.federation.provider_id
            ),
        ),
        ("Issuer", config.federation.issuer_uri.clone()),
        ("Repositories", config.federation.repositories.join("\n")),
        ("Secret", config.secret.name.clone()),
        ("Secret accessors", secret_accessors(config).join("\n")),
        ("Services", config.services.join("\n")),
        (
            "Scheduler job",
            config
                .scheduler
                .as_ref()
                .map(|s| format!("{} {} {}", s.job, s.http_method, s.uri))
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    format!("Configuration is valid.\n{}\n", table)
}
