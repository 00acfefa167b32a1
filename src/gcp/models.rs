use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Resource kinds the engine knows how to observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Project,
    ServiceAccount,
    IdentityPool,
    IdentityProvider,
    Secret,
    RunService,
    SchedulerJob,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Project => "Project",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::IdentityPool => "IdentityPool",
            ResourceKind::IdentityProvider => "IdentityProvider",
            ResourceKind::Secret => "Secret",
            ResourceKind::RunService => "RunService",
            ResourceKind::SchedulerJob => "SchedulerJob",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state reported for workload identity pools and providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    #[default]
    Active,
    Deleted,
    #[serde(other)]
    StateUnspecified,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Deleted => "DELETED",
            LifecycleState::StateUnspecified => "STATE_UNSPECIFIED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub project_id: String,
    pub project_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAccount {
    pub email: String,
    pub unique_id: String,
    pub display_name: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityPool {
    pub pool_id: String,
    /// Full resource name, e.g. `projects/123456/locations/global/workloadIdentityPools/github-pool`
    pub name: String,
    /// Numeric project number embedded in the resource name
    pub project_number: u64,
    pub display_name: String,
    pub state: LifecycleState,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSpec {
    pub pool_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityProvider {
    pub pool_id: String,
    pub provider_id: String,
    pub name: String,
    pub issuer_uri: String,
    pub attribute_mapping: BTreeMap<String, String>,
    pub attribute_condition: Option<String>,
    pub state: LifecycleState,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSpec {
    pub pool_id: String,
    pub provider_id: String,
    pub issuer_uri: String,
    pub attribute_mapping: BTreeMap<String, String>,
    pub attribute_condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Secret {
    pub name: String,
    pub resource_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunService {
    pub name: String,
    pub region: String,
    pub uri: Option<String>,
}

/// A Cloud Scheduler job with an HTTP target authenticated by an OIDC token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerJob {
    pub name: String,
    pub region: String,
    pub http_method: String,
    pub uri: String,
    pub oidc_service_account: Option<String>,
    pub oidc_audience: Option<String>,
    pub schedule: String,
    pub time_zone: String,
}

/// Mutable scheduler job fields, used to build update masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SchedulerField {
    HttpMethod,
    Uri,
    OidcServiceAccount,
    OidcAudience,
    Schedule,
    TimeZone,
}

impl SchedulerField {
    pub const ALL: [SchedulerField; 6] = [
        SchedulerField::HttpMethod,
        SchedulerField::Uri,
        SchedulerField::OidcServiceAccount,
        SchedulerField::OidcAudience,
        SchedulerField::Schedule,
        SchedulerField::TimeZone,
    ];

    /// Field name as it appears in findings
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerField::HttpMethod => "httpMethod",
            SchedulerField::Uri => "uri",
            SchedulerField::OidcServiceAccount => "oidcToken.serviceAccountEmail",
            SchedulerField::OidcAudience => "oidcToken.audience",
            SchedulerField::Schedule => "schedule",
            SchedulerField::TimeZone => "timeZone",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// Path used in the Cloud Scheduler `updateMask` parameter
    pub fn update_mask_path(&self) -> &'static str {
        match self {
            SchedulerField::HttpMethod => "http_target.http_method",
            SchedulerField::Uri => "http_target.uri",
            SchedulerField::OidcServiceAccount => "http_target.oidc_token.service_account_email",
            SchedulerField::OidcAudience => "http_target.oidc_token.audience",
            SchedulerField::Schedule => "schedule",
            SchedulerField::TimeZone => "time_zone",
        }
    }

    /// Flag used by `gcloud scheduler jobs update http`
    pub fn gcloud_flag(&self, job: &SchedulerJob) -> String {
        match self {
            SchedulerField::HttpMethod => format!("--http-method={}", job.http_method),
            SchedulerField::Uri => format!("--uri={}", job.uri),
            SchedulerField::OidcServiceAccount => format!(
                "--oidc-service-account-email={}",
                job.oidc_service_account.as_deref().unwrap_or_default()
            ),
            SchedulerField::OidcAudience => format!(
                "--oidc-token-audience={}",
                job.oidc_audience.as_deref().unwrap_or_default()
            ),
            SchedulerField::Schedule => format!("--schedule='{}'", job.schedule),
            SchedulerField::TimeZone => format!("--time-zone={}", job.time_zone),
        }
    }

    /// Current value of this field on `job`, rendered for display
    pub fn value_of(&self, job: &SchedulerJob) -> String {
        match self {
            SchedulerField::HttpMethod => job.http_method.to_uppercase(),
            SchedulerField::Uri => job.uri.clone(),
            SchedulerField::OidcServiceAccount => job
                .oidc_service_account
                .clone()
                .unwrap_or_else(|| "<none>".to_string()),
            SchedulerField::OidcAudience => job
                .oidc_audience
                .clone()
                .unwrap_or_else(|| "<none>".to_string()),
            SchedulerField::Schedule => job.schedule.clone(),
            SchedulerField::TimeZone => job.time_zone.clone(),
        }
    }
}

/// Scope a role binding applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Scope {
    Project {
        project_id: String,
    },
    ServiceAccount {
        project_id: String,
        email: String,
    },
    Secret {
        project_id: String,
        name: String,
    },
    RunService {
        project_id: String,
        region: String,
        name: String,
    },
}

impl Scope {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Scope::Project { .. } => ResourceKind::Project,
            Scope::ServiceAccount { .. } => ResourceKind::ServiceAccount,
            Scope::Secret { .. } => ResourceKind::Secret,
            Scope::RunService { .. } => ResourceKind::RunService,
        }
    }

    /// Short name of the resource the scope points at
    pub fn resource_name(&self) -> &str {
        match self {
            Scope::Project { project_id } => project_id,
            Scope::ServiceAccount { email, .. } => email,
            Scope::Secret { name, .. } => name,
            Scope::RunService { name, .. } => name,
        }
    }

    /// Equivalent `gcloud` command for adding or removing a binding on this scope
    pub fn gcloud_binding_command(&self, verb: &str, role: &str, member: &str) -> String {
        match self {
            Scope::Project { project_id } => format!(
                "gcloud projects {}-iam-policy-binding {} --member='{}' --role='{}'",
                verb, project_id, member, role
            ),
            Scope::ServiceAccount { project_id, email } => format!(
                "gcloud iam service-accounts {}-iam-policy-binding {} --project={} --member='{}' --role='{}'",
                verb, email, project_id, member, role
            ),
            Scope::Secret { project_id, name } => format!(
                "gcloud secrets {}-iam-policy-binding {} --project={} --member='{}' --role='{}'",
                verb, name, project_id, member, role
            ),
            Scope::RunService {
                project_id,
                region,
                name,
            } => format!(
                "gcloud run services {}-iam-policy-binding {} --project={} --region={} --member='{}' --role='{}'",
                verb, name, project_id, region, member, role
            ),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Project { project_id } => write!(f, "project/{}", project_id),
            Scope::ServiceAccount { email, .. } => write!(f, "serviceAccount/{}", email),
            Scope::Secret { name, .. } => write!(f, "secret/{}", name),
            Scope::RunService { region, name, .. } => write!(f, "run/{}/{}", region, name),
        }
    }
}

/// One role entry of an IAM policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Conditional bindings are carried through untouched and never matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

/// A parsed IAM policy
///
/// Comparison is done over the set of unconditional `(role, member)` pairs,
/// never over the serialized text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

impl Policy {
    /// Whether `member` holds `role` unconditionally
    pub fn has(&self, role: &str, member: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.condition.is_none() && b.role == role && b.members.contains(member))
    }

    /// All unconditional `(role, member)` pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .filter(|b| b.condition.is_none())
            .flat_map(|b| b.members.iter().map(move |m| (b.role.as_str(), m.as_str())))
    }

    /// Add `member` to `role`. Returns false when it was already present.
    pub fn grant(&mut self, role: &str, member: &str) -> bool {
        if self.has(role, member) {
            return false;
        }
        if let Some(binding) = self
            .bindings
            .iter_mut()
            .find(|b| b.condition.is_none() && b.role == role)
        {
            binding.members.insert(member.to_string());
        } else {
            self.bindings.push(Binding {
                role: role.to_string(),
                members: BTreeSet::from([member.to_string()]),
                condition: None,
            });
        }
        true
    }

    /// Remove `member` from `role`. Returns false when it was not present.
    pub fn revoke(&mut self, role: &str, member: &str) -> bool {
        let mut removed = false;
        for binding in self
            .bindings
            .iter_mut()
            .filter(|b| b.condition.is_none() && b.role == role)
        {
            removed |= binding.members.remove(member);
        }
        self.bindings.retain(|b| !b.members.is_empty());
        removed
    }
}
