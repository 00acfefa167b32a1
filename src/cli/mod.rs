pub mod check_config;
pub mod cleanup;
pub mod fix;
pub mod scheduler;
pub mod verify;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::engine::executor::FailurePolicy;
use crate::engine::Engine;
use crate::gcp::GcpClient;
use crate::settings::Settings;

/// How reports are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn load_settings(config_file: Option<&Path>) -> Result<Settings> {
    Settings::load(config_file).context("Failed to load configuration")
}

/// Build an engine talking to the real control plane
pub async fn connect(settings: &Settings, failure_policy: FailurePolicy) -> Result<Engine> {
    let client = GcpClient::new(settings.gcp.clone())
        .await
        .context("Failed to initialise the Google Cloud client")?;
    Ok(Engine::new(
        Arc::new(client),
        settings.trust_config(),
        failure_policy,
    ))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
