use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::engine::config::{
    default_attribute_mapping, FederationConfig, SchedulerConfig, SecretConfig,
    ServiceAccountConfig, TrustConfig, GITHUB_ISSUER_URI,
};
use crate::engine::executor::FailurePolicy;

/// Environment variables read by the loader itself, never merged as settings
const LOADER_VARS: [&str; 2] = ["TRUSTLINE_CONFIG_DIR", "TRUSTLINE_RUN_MODE"];

const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub project: ProjectSettings,
    pub service_account: ServiceAccountSettings,
    pub federation: FederationSettings,
    pub secret: SecretSettings,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub scheduler: Option<SchedulerSettings>,
    #[serde(default)]
    pub gcp: GcpSettings,
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectSettings {
    pub id: String,
    pub region: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceAccountSettings {
    /// Account id, the part of the email before `@`
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationSettings {
    pub pool: String,
    #[serde(default)]
    pub pool_display_name: Option<String>,
    pub provider: String,
    #[serde(default = "default_issuer_uri")]
    pub issuer_uri: String,
    pub repositories: Vec<String>,
    #[serde(default = "default_attribute_mapping")]
    pub attribute_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecretSettings {
    pub name: String,
    /// Additional service account emails allowed to read the secret
    #[serde(default)]
    pub accessors: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    pub job: String,
    /// Defaults to the project region
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_http_method")]
    pub http_method: String,
    pub uri: String,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    pub schedule: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

/// Control-plane client settings
#[derive(Debug, Deserialize, Clone)]
pub struct GcpSettings {
    /// Bearer token; falls back to GOOGLE_OAUTH_ACCESS_TOKEN and then gcloud
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound for waiting on a long-running IAM operation
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    #[serde(default = "default_iam_endpoint")]
    pub iam_endpoint: String,
    #[serde(default = "default_resource_manager_endpoint")]
    pub resource_manager_endpoint: String,
    #[serde(default = "default_secret_manager_endpoint")]
    pub secret_manager_endpoint: String,
    #[serde(default = "default_run_endpoint")]
    pub run_endpoint: String,
    #[serde(default = "default_scheduler_endpoint")]
    pub scheduler_endpoint: String,
}

impl Default for GcpSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            iam_endpoint: default_iam_endpoint(),
            resource_manager_endpoint: default_resource_manager_endpoint(),
            secret_manager_endpoint: default_secret_manager_endpoint(),
            run_endpoint: default_run_endpoint(),
            scheduler_endpoint: default_scheduler_endpoint(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineSettings {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_issuer_uri() -> String {
    GITHUB_ISSUER_URI.to_string()
}

fn default_http_method() -> String {
    "POST".to_string()
}

fn default_time_zone() -> String {
    "Etc/UTC".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_operation_timeout_secs() -> u64 {
    120
}

fn default_iam_endpoint() -> String {
    "https://iam.googleapis.com".to_string()
}

fn default_resource_manager_endpoint() -> String {
    "https://cloudresourcemanager.googleapis.com".to_string()
}

fn default_secret_manager_endpoint() -> String {
    "https://secretmanager.googleapis.com".to_string()
}

fn default_run_endpoint() -> String {
    "https://run.googleapis.com".to_string()
}

fn default_scheduler_endpoint() -> String {
    "https://cloudscheduler.googleapis.com".to_string()
}

impl Settings {
    /// Substitute environment variables in a string value
    /// Replaces ${VAR_NAME} or ${VAR_NAME:-default} with environment variable values
    fn substitute_env_vars_in_string(s: &str) -> Result<String, ConfigError> {
        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
            .map_err(|e| ConfigError::Message(format!("Invalid substitution pattern: {}", e)))?;

        Ok(re
            .replace_all(s, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map(|m| m.as_str());

                match env::var(var_name) {
                    Ok(val) => val,
                    Err(_) => default_value.unwrap_or("").to_string(),
                }
            })
            .to_string())
    }

    /// Convert a config::Value to a serde_json::Value, performing environment variable substitution
    fn config_value_to_json(value: &config::Value) -> Result<serde_json::Value, ConfigError> {
        use config::ValueKind;

        Ok(match &value.kind {
            ValueKind::Nil => serde_json::Value::Null,
            ValueKind::Boolean(b) => serde_json::Value::Bool(*b),
            ValueKind::I64(i) => serde_json::Value::Number((*i).into()),
            ValueKind::I128(i) => serde_json::Value::Number((*i as i64).into()),
            ValueKind::U64(u) => serde_json::Value::Number((*u).into()),
            ValueKind::U128(u) => serde_json::Value::Number((*u as u64).into()),
            ValueKind::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueKind::String(s) => {
                serde_json::Value::String(Self::substitute_env_vars_in_string(s)?)
            }
            ValueKind::Table(table) => {
                let mut map = serde_json::Map::new();
                for (k, v) in table.iter() {
                    map.insert(k.clone(), Self::config_value_to_json(v)?);
                }
                serde_json::Value::Object(map)
            }
            ValueKind::Array(arr) => serde_json::Value::Array(
                arr.iter()
                    .map(Self::config_value_to_json)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Try to add a config file with multiple extension attempts (.toml, .yaml, .yml)
    /// Returns Ok(true) if a file was loaded, Ok(false) if no file found (when not required)
    fn try_add_config_file(
        builder: &mut ConfigBuilder<DefaultState>,
        config_dir: &Path,
        name: &str,
        required: bool,
    ) -> Result<bool, ConfigError> {
        for ext in ["toml", "yaml", "yml"] {
            let path = config_dir.join(format!("{}.{}", name, ext));
            if path.exists() {
                tracing::info!("Loading config file: {}", path.display());
                *builder = builder
                    .clone()
                    .add_source(config::File::with_name(&config_dir.join(name).to_string_lossy()));
                return Ok(true);
            }
        }

        if required {
            Err(ConfigError::Message(format!(
                "Required config file not found: {}/{}.{{toml,yaml,yml}}",
                config_dir.display(),
                name
            )))
        } else {
            tracing::debug!(
                "Optional config file not found: {}/{}.{{toml,yaml,yml}}",
                config_dir.display(),
                name
            );
            Ok(false)
        }
    }

    /// Directory holding the layered config files
    ///
    /// `TRUSTLINE_CONFIG_DIR` wins, then `./config` if present, then the user
    /// config directory (`~/.config/trustline` on Linux).
    fn config_dir() -> PathBuf {
        if let Ok(dir) = env::var("TRUSTLINE_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        let local = PathBuf::from("config");
        if local.is_dir() {
            return local;
        }
        dirs::config_dir()
            .map(|d| d.join("trustline"))
            .unwrap_or(local)
    }

    /// Load settings from a single file, or from the layered config directory
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Message(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                tracing::info!("Loading config file: {}", path.display());
                Config::builder().add_source(config::File::from(path.to_path_buf()))
            }
            None => {
                let run_mode = env::var("TRUSTLINE_RUN_MODE").ok();
                Self::layered(&Self::config_dir(), run_mode.as_deref())?
            }
        };

        let env_vars = env::vars()
            .filter(|(k, _)| k.starts_with("TRUSTLINE_") && !LOADER_VARS.contains(&k.as_str()))
            .collect();
        Self::build(builder, env_vars)
    }

    /// default, then the run mode, then local
    fn layered(
        config_dir: &Path,
        run_mode: Option<&str>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let mut builder = Config::builder();

        // 1. Load default config (required)
        Self::try_add_config_file(&mut builder, config_dir, "default", true)?;

        // 2. Load run-mode specific config (optional)
        if let Some(run_mode) = run_mode {
            Self::try_add_config_file(&mut builder, config_dir, run_mode, false)?;
        }

        // 3. Load local config (optional, not checked into git)
        Self::try_add_config_file(&mut builder, config_dir, "local", false)?;

        Ok(builder)
    }

    fn build(
        builder: ConfigBuilder<DefaultState>,
        env_vars: config::Map<String, String>,
    ) -> Result<Self, ConfigError> {
        // TRUSTLINE_PROJECT__ID=... overrides project.id
        let config = builder
            .add_source(
                config::Environment::with_prefix("TRUSTLINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("federation.repositories")
                    .with_list_parse_key("services")
                    .with_list_parse_key("secret.accessors")
                    .with_list_parse_key("service_account.roles")
                    .source(Some(env_vars)),
            )
            .build()?;

        let root_value = config
            .cache
            .into_table()
            .map_err(|e| ConfigError::Message(format!("Failed to get config table: {}", e)))?;

        let mut json_map = serde_json::Map::new();
        for (k, v) in root_value.iter() {
            json_map.insert(k.clone(), Self::config_value_to_json(v)?);
        }
        let json_value = serde_json::Value::Object(json_map);

        let mut unused_fields = Vec::new();
        let settings: Settings = serde_ignored::deserialize(json_value, |path| {
            unused_fields.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field: {}", field);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.project.id.is_empty() {
            return Err(ConfigError::Message(
                "Project id not configured. Set [project] id or TRUSTLINE_PROJECT__ID".to_string(),
            ));
        }
        if self.project.region.is_empty() {
            return Err(ConfigError::Message(
                "Project region not configured. Set [project] region".to_string(),
            ));
        }

        let name = &self.service_account.name;
        let valid_account_id = (6..=30).contains(&name.len())
            && name.starts_with(|c: char| c.is_ascii_lowercase())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !name.ends_with('-');
        if !valid_account_id {
            return Err(ConfigError::Message(format!(
                "Invalid service_account name '{}': expected 6-30 lowercase letters, digits or hyphens, starting with a letter",
                name
            )));
        }

        let federation = &self.federation;
        if federation.pool.is_empty() || federation.provider.is_empty() {
            return Err(ConfigError::Message(
                "Federation pool and provider ids must not be empty".to_string(),
            ));
        }
        if federation.repositories.is_empty() {
            return Err(ConfigError::Message(
                "At least one repository must be listed in [federation] repositories".to_string(),
            ));
        }
        for repository in &federation.repositories {
            Self::validate_repository(repository)?;
        }
        if !federation.attribute_mapping.contains_key("attribute.repository") {
            return Err(ConfigError::Message(
                "[federation] attribute_mapping must map attribute.repository".to_string(),
            ));
        }

        if self.secret.name.is_empty() {
            return Err(ConfigError::Message(
                "Secret name not configured. Set [secret] name".to_string(),
            ));
        }
        for accessor in &self.secret.accessors {
            if !accessor.contains('@') {
                return Err(ConfigError::Message(format!(
                    "Secret accessor '{}' is not a service account email",
                    accessor
                )));
            }
        }

        if let Some(scheduler) = &self.scheduler {
            if !HTTP_METHODS.contains(&scheduler.http_method.to_uppercase().as_str()) {
                return Err(ConfigError::Message(format!(
                    "Scheduler http_method '{}' is not one of {}",
                    scheduler.http_method,
                    HTTP_METHODS.join(", ")
                )));
            }
            if !scheduler.uri.starts_with("https://") {
                return Err(ConfigError::Message(format!(
                    "Scheduler uri must be an https URL. Got: '{}'",
                    scheduler.uri
                )));
            }
            if self.services.is_empty() {
                return Err(ConfigError::Message(
                    "A scheduler job is configured but no services are declared".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// `owner/name`, nothing more
    fn validate_repository(repository: &str) -> Result<(), ConfigError> {
        let valid = match repository.split_once('/') {
            Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
            None => false,
        };
        if !valid {
            return Err(ConfigError::Message(format!(
                "Repository '{}' must be written as owner/name",
                repository
            )));
        }
        Ok(())
    }

    /// Immutable configuration handed to the engine
    pub fn trust_config(&self) -> TrustConfig {
        TrustConfig {
            project_id: self.project.id.clone(),
            region: self.project.region.clone(),
            service_account: ServiceAccountConfig {
                account_id: self.service_account.name.clone(),
                display_name: self
                    .service_account
                    .display_name
                    .clone()
                    .unwrap_or_else(|| self.service_account.name.clone()),
                roles: self.service_account.roles.clone(),
            },
            federation: FederationConfig {
                pool_id: self.federation.pool.clone(),
                pool_display_name: self
                    .federation
                    .pool_display_name
                    .clone()
                    .unwrap_or_else(|| self.federation.pool.clone()),
                provider_id: self.federation.provider.clone(),
                issuer_uri: self.federation.issuer_uri.clone(),
                repositories: self.federation.repositories.clone(),
                attribute_mapping: self.federation.attribute_mapping.clone(),
            },
            secret: SecretConfig {
                name: self.secret.name.clone(),
                accessors: self.secret.accessors.clone(),
            },
            services: self.services.clone(),
            scheduler: self.scheduler.as_ref().map(|s| SchedulerConfig {
                job: s.job.clone(),
                region: s.region.clone().unwrap_or_else(|| self.project.region.clone()),
                http_method: s.http_method.to_uppercase(),
                uri: s.uri.clone(),
                service_account: s.service_account.clone(),
                audience: s.audience.clone(),
                schedule: s.schedule.clone(),
                time_zone: s.time_zone.clone(),
            }),
        }
    }
}
