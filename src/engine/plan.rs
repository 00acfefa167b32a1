use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::config::TrustConfig;
use super::diff::Finding;
use super::expectation::{Expectation, RoleBinding, ROLE_RUN_INVOKER, ROLE_TOKEN_CREATOR};
use super::principal::Member;
use crate::gcp::{PoolSpec, ProviderSpec, ResourceKind, SchedulerField, SchedulerJob, Scope};

/// Which part of the trust chain a fix run may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FixScope {
    #[default]
    All,
    /// Service accounts, pool, provider, project roles, secret access and orphans
    Federation,
    /// Scheduler job, token creator and invoker bindings
    Scheduler,
}

impl FixScope {
    pub fn includes(&self, finding: &Finding) -> bool {
        let scheduler_side = match finding {
            Finding::BindingMissing { role, .. } | Finding::BindingOrphaned { role, .. } => {
                role == ROLE_TOKEN_CREATOR || role == ROLE_RUN_INVOKER
            }
            Finding::ResourceAbsent { kind, .. } | Finding::AttributeMismatch { kind, .. } => {
                // Service accounts are prerequisites of both halves
                if *kind == ResourceKind::ServiceAccount {
                    return true;
                }
                *kind == ResourceKind::SchedulerJob || *kind == ResourceKind::RunService
            }
            Finding::CrossEntityViolation { .. } => true,
        };
        match self {
            FixScope::All => true,
            FixScope::Federation => !scheduler_side,
            FixScope::Scheduler => scheduler_side,
        }
    }
}

/// A resource an action creates or repairs, used to track dependencies
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResourceRef {
    ServiceAccount(String),
    Pool,
    Provider,
    SchedulerJob,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::ServiceAccount(email) => write!(f, "service account {}", email),
            ResourceRef::Pool => write!(f, "identity pool"),
            ResourceRef::Provider => write!(f, "identity provider"),
            ResourceRef::SchedulerJob => write!(f, "scheduler job"),
        }
    }
}

/// A single corrective mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateServiceAccount {
        project_id: String,
        account_id: String,
        display_name: String,
        email: String,
    },
    EnableServiceAccount {
        project_id: String,
        email: String,
    },
    CreatePool {
        project_id: String,
        spec: PoolSpec,
    },
    UndeletePool {
        project_id: String,
        pool_id: String,
    },
    EnablePool {
        project_id: String,
        pool_id: String,
    },
    UndeleteProvider {
        project_id: String,
        pool_id: String,
        provider_id: String,
    },
    DeleteProvider {
        project_id: String,
        pool_id: String,
        provider_id: String,
    },
    CreateProvider {
        project_id: String,
        spec: ProviderSpec,
    },
    AddBinding(RoleBinding),
    RemoveBinding(RoleBinding),
    CreateSchedulerJob {
        project_id: String,
        job: SchedulerJob,
    },
    UpdateSchedulerJob {
        project_id: String,
        job: SchedulerJob,
        fields: Vec<SchedulerField>,
    },
}

impl Action {
    /// Position in the fixed dependency order
    pub fn stage(&self) -> u8 {
        match self {
            Action::CreateServiceAccount { .. } | Action::EnableServiceAccount { .. } => 1,
            Action::AddBinding(b) if matches!(b.scope, Scope::Project { .. }) => 2,
            Action::CreatePool { .. } | Action::UndeletePool { .. } | Action::EnablePool { .. } => 3,
            Action::UndeleteProvider { .. }
            | Action::DeleteProvider { .. }
            | Action::CreateProvider { .. } => 4,
            Action::AddBinding(_) => 5,
            Action::RemoveBinding(_) => 6,
            Action::CreateSchedulerJob { .. } | Action::UpdateSchedulerJob { .. } => 7,
        }
    }

    /// Whether the action removes something and needs confirmation
    pub fn is_destructive(&self) -> bool {
        matches!(self, Action::DeleteProvider { .. } | Action::RemoveBinding(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateServiceAccount { .. } => "CreateServiceAccount",
            Action::EnableServiceAccount { .. } => "EnableServiceAccount",
            Action::CreatePool { .. } => "CreatePool",
            Action::UndeletePool { .. } => "UndeletePool",
            Action::EnablePool { .. } => "EnablePool",
            Action::UndeleteProvider { .. } => "UndeleteProvider",
            Action::DeleteProvider { .. } => "DeleteProvider",
            Action::CreateProvider { .. } => "CreateProvider",
            Action::AddBinding(_) => "AddBinding",
            Action::RemoveBinding(_) => "RemoveBinding",
            Action::CreateSchedulerJob { .. } => "CreateSchedulerJob",
            Action::UpdateSchedulerJob { .. } => "UpdateSchedulerJob",
        }
    }

    /// Resources this action creates or repairs
    pub fn produces(&self) -> Vec<ResourceRef> {
        match self {
            Action::CreateServiceAccount { email, .. } | Action::EnableServiceAccount { email, .. } => {
                vec![ResourceRef::ServiceAccount(email.clone())]
            }
            Action::CreatePool { .. } | Action::UndeletePool { .. } | Action::EnablePool { .. } => {
                vec![ResourceRef::Pool]
            }
            Action::UndeleteProvider { .. }
            | Action::DeleteProvider { .. }
            | Action::CreateProvider { .. } => vec![ResourceRef::Provider],
            Action::CreateSchedulerJob { .. } | Action::UpdateSchedulerJob { .. } => {
                vec![ResourceRef::SchedulerJob]
            }
            Action::AddBinding(_) | Action::RemoveBinding(_) => vec![],
        }
    }

    /// Resources that must not have failed earlier in the run for this action to proceed
    pub fn requires(&self) -> Vec<ResourceRef> {
        match self {
            Action::CreateServiceAccount { .. }
            | Action::EnableServiceAccount { .. }
            | Action::CreatePool { .. }
            | Action::UndeletePool { .. }
            | Action::EnablePool { .. }
            | Action::RemoveBinding(_) => vec![],
            Action::UndeleteProvider { .. }
            | Action::DeleteProvider { .. }
            | Action::CreateProvider { .. } => vec![ResourceRef::Pool],
            Action::AddBinding(binding) => {
                let mut refs = vec![];
                if let Scope::ServiceAccount { email, .. } = &binding.scope {
                    refs.push(ResourceRef::ServiceAccount(email.clone()));
                }
                match Member::parse(&binding.member) {
                    Member::ServiceAccount(email) => refs.push(ResourceRef::ServiceAccount(email)),
                    Member::PrincipalSet(_) => {
                        refs.push(ResourceRef::Pool);
                        refs.push(ResourceRef::Provider);
                    }
                    Member::Other(_) => {}
                }
                refs
            }
            Action::CreateSchedulerJob { job, .. } | Action::UpdateSchedulerJob { job, .. } => job
                .oidc_service_account
                .iter()
                .map(|email| ResourceRef::ServiceAccount(email.clone()))
                .collect(),
        }
    }

    /// Resource kinds whose live state this action changes
    pub fn affected_kind(&self) -> ResourceKind {
        match self {
            Action::CreateServiceAccount { .. } | Action::EnableServiceAccount { .. } => {
                ResourceKind::ServiceAccount
            }
            Action::CreatePool { .. } | Action::UndeletePool { .. } | Action::EnablePool { .. } => {
                ResourceKind::IdentityPool
            }
            Action::UndeleteProvider { .. }
            | Action::DeleteProvider { .. }
            | Action::CreateProvider { .. } => ResourceKind::IdentityProvider,
            Action::AddBinding(b) | Action::RemoveBinding(b) => b.scope.kind(),
            Action::CreateSchedulerJob { .. } | Action::UpdateSchedulerJob { .. } => {
                ResourceKind::SchedulerJob
            }
        }
    }

    /// Equivalent `gcloud` invocation
    pub fn command(&self) -> String {
        match self {
            Action::CreateServiceAccount {
                project_id,
                account_id,
                display_name,
                ..
            } => format!(
                "gcloud iam service-accounts create {} --project={} --display-name='{}'",
                account_id, project_id, display_name
            ),
            Action::EnableServiceAccount { project_id, email } => format!(
                "gcloud iam service-accounts enable {} --project={}",
                email, project_id
            ),
            Action::CreatePool { project_id, spec } => format!(
                "gcloud iam workload-identity-pools create {} --project={} --location=global --display-name='{}'",
                spec.pool_id, project_id, spec.display_name
            ),
            Action::UndeletePool {
                project_id,
                pool_id,
            } => format!(
                "gcloud iam workload-identity-pools undelete {} --project={} --location=global",
                pool_id, project_id
            ),
            Action::EnablePool {
                project_id,
                pool_id,
            } => format!(
                "gcloud iam workload-identity-pools update {} --project={} --location=global --no-disabled",
                pool_id, project_id
            ),
            Action::UndeleteProvider {
                project_id,
                pool_id,
                provider_id,
            } => format!(
                "gcloud iam workload-identity-pools providers undelete {} --workload-identity-pool={} --project={} --location=global",
                provider_id, pool_id, project_id
            ),
            Action::DeleteProvider {
                project_id,
                pool_id,
                provider_id,
            } => format!(
                "gcloud iam workload-identity-pools providers delete {} --workload-identity-pool={} --project={} --location=global",
                provider_id, pool_id, project_id
            ),
            Action::CreateProvider { project_id, spec } => {
                let mapping = spec
                    .attribute_mapping
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(",");
                format!(
                    "gcloud iam workload-identity-pools providers create-oidc {} --workload-identity-pool={} --project={} --location=global --issuer-uri={} --attribute-mapping='{}' --attribute-condition=\"{}\"",
                    spec.provider_id, spec.pool_id, project_id, spec.issuer_uri, mapping, spec.attribute_condition
                )
            }
            Action::AddBinding(b) => b.scope.gcloud_binding_command("add", &b.role, &b.member),
            Action::RemoveBinding(b) => b.scope.gcloud_binding_command("remove", &b.role, &b.member),
            Action::CreateSchedulerJob { project_id, job } => {
                let mut command = format!(
                    "gcloud scheduler jobs create http {} --project={} --location={}",
                    job.name, project_id, job.region
                );
                for field in SchedulerField::ALL {
                    if field == SchedulerField::OidcAudience && job.oidc_audience.is_none() {
                        continue;
                    }
                    command.push(' ');
                    command.push_str(&field.gcloud_flag(job));
                }
                command
            }
            Action::UpdateSchedulerJob {
                project_id,
                job,
                fields,
            } => {
                let mut command = format!(
                    "gcloud scheduler jobs update http {} --project={} --location={}",
                    job.name, project_id, job.region
                );
                for field in fields {
                    command.push(' ');
                    command.push_str(&field.gcloud_flag(job));
                }
                command
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateServiceAccount { email, .. } | Action::EnableServiceAccount { email, .. } => {
                write!(f, "{}({})", self.name(), email)
            }
            Action::CreatePool { spec, .. } => write!(f, "{}({})", self.name(), spec.pool_id),
            Action::UndeletePool { pool_id, .. } | Action::EnablePool { pool_id, .. } => {
                write!(f, "{}({})", self.name(), pool_id)
            }
            Action::UndeleteProvider { provider_id, .. } | Action::DeleteProvider { provider_id, .. } => {
                write!(f, "{}({})", self.name(), provider_id)
            }
            Action::CreateProvider { spec, .. } => {
                write!(f, "{}({})", self.name(), spec.provider_id)
            }
            Action::AddBinding(b) | Action::RemoveBinding(b) => write!(f, "{}({})", self.name(), b),
            Action::CreateSchedulerJob { job, .. } => write!(f, "{}({})", self.name(), job.name),
            Action::UpdateSchedulerJob { job, fields, .. } => write!(
                f,
                "{}({}, [{}])",
                self.name(),
                job.name,
                fields
                    .iter()
                    .map(SchedulerField::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// An action together with the findings it is meant to resolve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub action: Action,
    pub addresses: Vec<Finding>,
}

/// Ordered, deduplicated list of corrective actions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.steps.iter().map(|s| &s.action)
    }

    pub fn has_destructive_steps(&self) -> bool {
        self.actions().any(Action::is_destructive)
    }

    fn add(&mut self, action: Action, finding: &Finding) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.action == action) {
            if !step.addresses.contains(finding) {
                step.addresses.push(finding.clone());
            }
            return;
        }
        self.steps.push(PlannedStep {
            action,
            addresses: vec![finding.clone()],
        });
    }
}

/// Map findings to actions in dependency order
///
/// Findings that have no safe automatic remedy (absent secrets and services,
/// cross-entity violations) produce no action.
pub fn plan(
    config: &TrustConfig,
    expectation: &Expectation,
    findings: &[Finding],
    scope: FixScope,
) -> Plan {
    let project_id = &config.project_id;
    let mut plan = Plan::default();
    let findings: Vec<&Finding> = findings.iter().filter(|f| scope.includes(f)).collect();

    let provider_ref = || {
        (
            expectation.provider.pool_id.clone(),
            expectation.provider.provider_id.clone(),
        )
    };
    let mut job_fields = BTreeSet::new();
    let mut job_findings = vec![];

    for finding in &findings {
        match finding {
            Finding::ResourceAbsent { kind, name } => match kind {
                ResourceKind::ServiceAccount => {
                    let Some(account_id) = config.local_account_id(name) else {
                        continue;
                    };
                    let display_name = if *name == expectation.service_account_email {
                        config.service_account.display_name.clone()
                    } else {
                        account_id.to_string()
                    };
                    plan.add(
                        Action::CreateServiceAccount {
                            project_id: project_id.clone(),
                            account_id: account_id.to_string(),
                            display_name,
                            email: name.clone(),
                        },
                        finding,
                    );
                }
                ResourceKind::IdentityPool => plan.add(
                    Action::CreatePool {
                        project_id: project_id.clone(),
                        spec: expectation.pool.clone(),
                    },
                    finding,
                ),
                ResourceKind::IdentityProvider => plan.add(
                    Action::CreateProvider {
                        project_id: project_id.clone(),
                        spec: expectation.provider.clone(),
                    },
                    finding,
                ),
                ResourceKind::SchedulerJob => {
                    if let Some(job) = &expectation.scheduler_job {
                        plan.add(
                            Action::CreateSchedulerJob {
                                project_id: project_id.clone(),
                                job: job.clone(),
                            },
                            finding,
                        );
                    }
                }
                ResourceKind::Project | ResourceKind::Secret | ResourceKind::RunService => {}
            },
            Finding::AttributeMismatch {
                kind, name, field, ..
            } => match (kind, field.as_str()) {
                (ResourceKind::ServiceAccount, "disabled") => plan.add(
                    Action::EnableServiceAccount {
                        project_id: project_id.clone(),
                        email: name.clone(),
                    },
                    finding,
                ),
                (ResourceKind::IdentityPool, "state") => plan.add(
                    Action::UndeletePool {
                        project_id: project_id.clone(),
                        pool_id: name.clone(),
                    },
                    finding,
                ),
                (ResourceKind::IdentityPool, "disabled") => plan.add(
                    Action::EnablePool {
                        project_id: project_id.clone(),
                        pool_id: name.clone(),
                    },
                    finding,
                ),
                (ResourceKind::IdentityProvider, "state") => {
                    let (pool_id, provider_id) = provider_ref();
                    plan.add(
                        Action::UndeleteProvider {
                            project_id: project_id.clone(),
                            pool_id,
                            provider_id,
                        },
                        finding,
                    );
                }
                (ResourceKind::IdentityProvider, _) => {
                    let (pool_id, provider_id) = provider_ref();
                    plan.add(
                        Action::DeleteProvider {
                            project_id: project_id.clone(),
                            pool_id,
                            provider_id,
                        },
                        finding,
                    );
                }
                (ResourceKind::SchedulerJob, field) => {
                    if let Some(field) = SchedulerField::from_name(field) {
                        job_fields.insert(field);
                        job_findings.push(*finding);
                    }
                }
                _ => {}
            },
            Finding::BindingMissing {
                subject,
                role,
                scope,
            } => plan.add(
                Action::AddBinding(RoleBinding::new(subject, role, scope.clone())),
                finding,
            ),
            Finding::BindingOrphaned {
                subject,
                role,
                scope,
            } => plan.add(
                Action::RemoveBinding(RoleBinding::new(subject, role, scope.clone())),
                finding,
            ),
            Finding::CrossEntityViolation { .. } => {}
        }
    }

    // Providers are never patched in place: every planned delete is followed by a create
    let recreated: Vec<Finding> = plan
        .steps
        .iter()
        .filter(|s| matches!(s.action, Action::DeleteProvider { .. }))
        .flat_map(|s| s.addresses.clone())
        .collect();
    for finding in &recreated {
        plan.add(
            Action::CreateProvider {
                project_id: project_id.clone(),
                spec: expectation.provider.clone(),
            },
            finding,
        );
    }

    if let (Some(job), false) = (&expectation.scheduler_job, job_fields.is_empty()) {
        let action = Action::UpdateSchedulerJob {
            project_id: project_id.clone(),
            job: job.clone(),
            fields: job_fields.into_iter().collect(),
        };
        for finding in job_findings {
            plan.add(action.clone(), finding);
        }
    }

    // Stable: keeps undelete/delete/create order inside the provider stage
    plan.steps.sort_by_key(|s| s.action.stage());
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config;
    use crate::engine::expectation::{expected, ROLE_SECRET_ACCESSOR, ROLE_WORKLOAD_IDENTITY_USER};

    fn mismatch(kind: ResourceKind, name: &str, field: &str, actual: &str, expected: &str) -> Finding {
        Finding::AttributeMismatch {
            kind,
            name: name.to_string(),
            field: field.to_string(),
            actual: actual.to_string(),
            expected: expected.to_string(),
        }
    }

    #[test]
    fn test_provider_condition_mismatch_is_delete_then_create() {
        let mut config = config::sample();
        config.federation.repositories = vec!["org/repoB".to_string()];
        let expectation = expected(&config, 123456);
        let findings = vec![mismatch(
            ResourceKind::IdentityProvider,
            "github-provider",
            "attributeCondition",
            "attribute.repository=='org/repoA'",
            "attribute.repository=='org/repoB'",
        )];

        let plan = plan(&config, &expectation, &findings, FixScope::All);
        let names: Vec<_> = plan.actions().map(Action::name).collect();
        assert_eq!(names, vec!["DeleteProvider", "CreateProvider"]);
        assert!(plan.steps[0].action.is_destructive());
        assert!(!plan.steps[1].action.is_destructive());
        assert!(matches!(
            &plan.steps[1].action,
            Action::CreateProvider { spec, .. } if spec.attribute_condition == "attribute.repository=='org/repoB'"
        ));
    }

    #[test]
    fn test_several_provider_mismatches_share_one_recreation() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let findings = vec![
            mismatch(ResourceKind::IdentityProvider, "github-provider", "issuerUri", "a", "b"),
            mismatch(ResourceKind::IdentityProvider, "github-provider", "attributeMapping", "a", "b"),
        ];

        let plan = plan(&config, &expectation, &findings, FixScope::All);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].addresses.len(), 2);
        assert_eq!(plan.steps[1].addresses.len(), 2);
    }

    #[test]
    fn test_scheduler_fields_fold_into_one_update() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let findings = vec![
            mismatch(ResourceKind::SchedulerJob, "nightly-rescore", "httpMethod", "GET", "POST"),
            mismatch(ResourceKind::SchedulerJob, "nightly-rescore", "timeZone", "UTC", "Europe/Berlin"),
        ];

        let plan = plan(&config, &expectation, &findings, FixScope::All);
        assert_eq!(plan.len(), 1);
        match &plan.steps[0].action {
            Action::UpdateSchedulerJob { fields, .. } => assert_eq!(
                fields,
                &vec![SchedulerField::HttpMethod, SchedulerField::TimeZone]
            ),
            other => panic!("unexpected action {}", other),
        }
        assert!(plan.steps[0]
            .action
            .command()
            .ends_with("--http-method=POST --time-zone=Europe/Berlin"));
    }

    #[test]
    fn test_dependency_order() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let sa = config.service_account_email();
        let sa_scope = Scope::ServiceAccount {
            project_id: config.project_id.clone(),
            email: sa.clone(),
        };
        let findings = vec![
            Finding::ResourceAbsent {
                kind: ResourceKind::SchedulerJob,
                name: "nightly-rescore".to_string(),
            },
            Finding::BindingOrphaned {
                subject: "principalSet://iam.googleapis.com/projects/123456/locations/global/workloadIdentityPools/github-pool/attribute.repository/hordia/old".to_string(),
                role: ROLE_WORKLOAD_IDENTITY_USER.to_string(),
                scope: sa_scope.clone(),
            },
            Finding::BindingMissing {
                subject: expectation.principals[0].to_string(),
                role: ROLE_WORKLOAD_IDENTITY_USER.to_string(),
                scope: sa_scope,
            },
            Finding::ResourceAbsent {
                kind: ResourceKind::IdentityProvider,
                name: "github-provider".to_string(),
            },
            Finding::ResourceAbsent {
                kind: ResourceKind::IdentityPool,
                name: "github-pool".to_string(),
            },
            Finding::BindingMissing {
                subject: format!("serviceAccount:{}", sa),
                role: "roles/run.admin".to_string(),
                scope: Scope::Project {
                    project_id: config.project_id.clone(),
                },
            },
            Finding::ResourceAbsent {
                kind: ResourceKind::ServiceAccount,
                name: sa.clone(),
            },
        ];

        let plan = plan(&config, &expectation, &findings, FixScope::All);
        let stages: Vec<_> = plan.actions().map(Action::stage).collect();
        assert_eq!(stages, vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(
            &plan.steps[0].action,
            Action::CreateServiceAccount { display_name, .. } if display_name == "GitHub Actions deployer"
        ));
    }

    #[test]
    fn test_unfixable_findings_have_no_action() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let findings = vec![
            Finding::ResourceAbsent {
                kind: ResourceKind::Secret,
                name: "engine-api-key".to_string(),
            },
            Finding::ResourceAbsent {
                kind: ResourceKind::RunService,
                name: "trust-engine".to_string(),
            },
            Finding::CrossEntityViolation {
                description: "x".to_string(),
            },
            Finding::ResourceAbsent {
                kind: ResourceKind::ServiceAccount,
                name: "someone@other-project.iam.gserviceaccount.com".to_string(),
            },
        ];
        assert!(plan(&config, &expectation, &findings, FixScope::All).is_empty());
    }

    #[test]
    fn test_scope_filters_findings() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let secret_scope = Scope::Secret {
            project_id: config.project_id.clone(),
            name: config.secret.name.clone(),
        };
        let findings = vec![
            Finding::BindingMissing {
                subject: "serviceAccount:a@hordia-prod.iam.gserviceaccount.com".to_string(),
                role: ROLE_SECRET_ACCESSOR.to_string(),
                scope: secret_scope,
            },
            mismatch(ResourceKind::SchedulerJob, "nightly-rescore", "httpMethod", "GET", "POST"),
        ];

        let federation = plan(&config, &expectation, &findings, FixScope::Federation);
        assert_eq!(federation.actions().map(Action::name).collect::<Vec<_>>(), vec!["AddBinding"]);

        let scheduler = plan(&config, &expectation, &findings, FixScope::Scheduler);
        assert_eq!(
            scheduler.actions().map(Action::name).collect::<Vec<_>>(),
            vec!["UpdateSchedulerJob"]
        );
    }

    #[test]
    fn test_principal_binding_requires_provider() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let action = Action::AddBinding(RoleBinding::new(
            expectation.principals[0].to_string(),
            ROLE_WORKLOAD_IDENTITY_USER,
            Scope::ServiceAccount {
                project_id: config.project_id.clone(),
                email: config.service_account_email(),
            },
        ));
        let requires = action.requires();
        assert!(requires.contains(&ResourceRef::Provider));
        assert!(requires.contains(&ResourceRef::ServiceAccount(config.service_account_email())));
    }
}
