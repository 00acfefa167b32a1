use std::collections::BTreeMap;

/// Declared trust configuration
///
/// Built once from [`crate::settings::Settings`] and passed by reference into
/// every engine component. Nothing in the engine mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustConfig {
    pub project_id: String,
    pub region: String,
    pub service_account: ServiceAccountConfig,
    pub federation: FederationConfig,
    pub secret: SecretConfig,
    /// Cloud Run services the CI identity deploys and the scheduler invokes
    pub services: Vec<String>,
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAccountConfig {
    pub account_id: String,
    pub display_name: String,
    /// Project-level roles the CI service account must hold
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FederationConfig {
    pub pool_id: String,
    pub pool_display_name: String,
    pub provider_id: String,
    pub issuer_uri: String,
    /// Repositories (`owner/name`) allowed to impersonate the service account
    pub repositories: Vec<String>,
    pub attribute_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecretConfig {
    pub name: String,
    /// Service account emails that must be able to read the secret.
    /// The CI service account is always included.
    pub accessors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub job: String,
    pub region: String,
    pub http_method: String,
    pub uri: String,
    /// Subject of the OIDC token; the CI service account when unset
    pub service_account: Option<String>,
    pub audience: Option<String>,
    pub schedule: String,
    pub time_zone: String,
}

pub const GITHUB_ISSUER_URI: &str = "https://token.actions.githubusercontent.com";

/// Attribute mapping used when none is configured
pub fn default_attribute_mapping() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("google.subject".to_string(), "assertion.sub".to_string()),
        ("attribute.actor".to_string(), "assertion.actor".to_string()),
        (
            "attribute.repository".to_string(),
            "assertion.repository".to_string(),
        ),
        (
            "attribute.repository_owner".to_string(),
            "assertion.repository_owner".to_string(),
        ),
    ])
}

impl TrustConfig {
    /// Email of the CI service account
    pub fn service_account_email(&self) -> String {
        format!(
            "{}@{}.iam.gserviceaccount.com",
            self.service_account.account_id, self.project_id
        )
    }

    /// Email of the account the scheduler authenticates as
    pub fn scheduler_subject(&self) -> Option<String> {
        self.scheduler.as_ref().map(|s| {
            s.service_account
                .clone()
                .unwrap_or_else(|| self.service_account_email())
        })
    }

    /// Every service account the configuration refers to, CI account first
    pub fn service_account_emails(&self) -> Vec<String> {
        let mut emails = vec![self.service_account_email()];
        for email in self
            .scheduler_subject()
            .into_iter()
            .chain(self.secret.accessors.iter().cloned())
        {
            if !emails.contains(&email) {
                emails.push(email);
            }
        }
        emails
    }

    /// Account id of a service account living in this project, if `email` is one
    pub fn local_account_id<'a>(&self, email: &'a str) -> Option<&'a str> {
        let suffix = format!("@{}.iam.gserviceaccount.com", self.project_id);
        email.strip_suffix(suffix.as_str()).filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
pub fn sample() -> TrustConfig {
    TrustConfig {
        project_id: "hordia-prod".to_string(),
        region: "europe-west1".to_string(),
        service_account: ServiceAccountConfig {
            account_id: "github-deployer".to_string(),
            display_name: "GitHub Actions deployer".to_string(),
            roles: vec![
                "roles/run.admin".to_string(),
                "roles/artifactregistry.writer".to_string(),
            ],
        },
        federation: FederationConfig {
            pool_id: "github-pool".to_string(),
            pool_display_name: "GitHub Actions".to_string(),
            provider_id: "github-provider".to_string(),
            issuer_uri: GITHUB_ISSUER_URI.to_string(),
            repositories: vec!["hordia/trust-engine-v2".to_string()],
            attribute_mapping: default_attribute_mapping(),
        },
        secret: SecretConfig {
            name: "engine-api-key".to_string(),
            accessors: vec!["engine-runtime@hordia-prod.iam.gserviceaccount.com".to_string()],
        },
        services: vec!["trust-engine".to_string(), "trust-engine-worker".to_string()],
        scheduler: Some(SchedulerConfig {
            job: "nightly-rescore".to_string(),
            region: "europe-west1".to_string(),
            http_method: "POST".to_string(),
            uri: "https://trust-engine-123456.europe-west1.run.app/tasks/rescore".to_string(),
            service_account: None,
            audience: None,
            schedule: "0 3 * * *".to_string(),
            time_zone: "Europe/Berlin".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_subject_defaults_to_ci_account() {
        let config = sample();
        assert_eq!(
            config.scheduler_subject().as_deref(),
            Some("github-deployer@hordia-prod.iam.gserviceaccount.com")
        );
    }

    #[test]
    fn test_service_account_emails_are_unique() {
        let mut config = sample();
        config
            .secret
            .accessors
            .push(config.service_account_email());
        let emails = config.service_account_emails();
        assert_eq!(
            emails,
            vec![
                "github-deployer@hordia-prod.iam.gserviceaccount.com".to_string(),
                "engine-runtime@hordia-prod.iam.gserviceaccount.com".to_string(),
            ]
        );
    }

    #[test]
    fn test_local_account_id() {
        let config = sample();
        assert_eq!(
            config.local_account_id("engine-runtime@hordia-prod.iam.gserviceaccount.com"),
            Some("engine-runtime")
        );
        assert_eq!(
            config.local_account_id("someone@other-project.iam.gserviceaccount.com"),
            None
        );
    }
}
