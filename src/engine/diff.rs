use serde::Serialize;
use std::fmt;

use super::condition;
use super::config::TrustConfig;
use super::expectation::{Expectation, ROLE_RUN_INVOKER};
use super::principal::{service_account_member, Member};
use super::scheduler::target_service_from_uri;
use super::snapshot::{Fetched, Snapshot};
use crate::gcp::{LifecycleState, ResourceKind, SchedulerField, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single divergence between live state and expectation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "finding")]
pub enum Finding {
    ResourceAbsent {
        kind: ResourceKind,
        name: String,
    },
    AttributeMismatch {
        kind: ResourceKind,
        name: String,
        field: String,
        actual: String,
        expected: String,
    },
    BindingMissing {
        subject: String,
        role: String,
        scope: Scope,
    },
    /// Present, but the subject is a principal built from a repository that is no longer declared
    BindingOrphaned {
        subject: String,
        role: String,
        scope: Scope,
    },
    CrossEntityViolation {
        description: String,
    },
}

/// Fields whose mismatch is only a warning
const SOFT_FIELDS: &[&str] = &["schedule", "timeZone", "oidcToken.audience", "displayName"];

impl Finding {
    fn mismatch(
        kind: ResourceKind,
        name: &str,
        field: &str,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Finding::AttributeMismatch {
            kind,
            name: name.to_string(),
            field: field.to_string(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Finding::ResourceAbsent { .. } => "ResourceAbsent",
            Finding::AttributeMismatch { .. } => "AttributeMismatch",
            Finding::BindingMissing { .. } => "BindingMissing",
            Finding::BindingOrphaned { .. } => "BindingOrphaned",
            Finding::CrossEntityViolation { .. } => "CrossEntityViolation",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Finding::AttributeMismatch { field, .. } if SOFT_FIELDS.contains(&field.as_str()) => {
                Severity::Warning
            }
            Finding::BindingOrphaned { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Resource kind whose state this finding describes
    pub fn kind(&self) -> ResourceKind {
        match self {
            Finding::ResourceAbsent { kind, .. } | Finding::AttributeMismatch { kind, .. } => *kind,
            Finding::BindingMissing { scope, .. } | Finding::BindingOrphaned { scope, .. } => {
                scope.kind()
            }
            Finding::CrossEntityViolation { .. } => ResourceKind::SchedulerJob,
        }
    }

    /// Human readable identity of the affected resource
    pub fn resource(&self) -> String {
        match self {
            Finding::ResourceAbsent { kind, name } | Finding::AttributeMismatch { kind, name, .. } => {
                format!("{}/{}", kind, name)
            }
            Finding::BindingMissing { scope, .. } | Finding::BindingOrphaned { scope, .. } => {
                scope.to_string()
            }
            Finding::CrossEntityViolation { .. } => "scheduler".to_string(),
        }
    }

    /// Remediation hint shown next to the finding
    pub fn hint(&self) -> String {
        match self {
            Finding::ResourceAbsent { kind, name } => match kind {
                ResourceKind::Secret => format!(
                    "create the secret with 'gcloud secrets create {}' and add a version",
                    name
                ),
                ResourceKind::RunService => {
                    format!("deploy the Cloud Run service '{}' before granting access", name)
                }
                _ => format!("create {} '{}' (run 'fix')", kind, name),
            },
            Finding::AttributeMismatch {
                kind: ResourceKind::IdentityProvider,
                ..
            } => "provider must be deleted and recreated with the expected settings".to_string(),
            Finding::AttributeMismatch {
                field,
                expected,
                ..
            } => format!("set {} to '{}'", field, expected),
            Finding::BindingMissing { subject, role, .. } => {
                format!("grant {} to {}", role, subject)
            }
            Finding::BindingOrphaned { subject, role, .. } => format!(
                "remove stale {} binding for {} (requires confirmation)",
                role, subject
            ),
            Finding::CrossEntityViolation { .. } => {
                "grant roles/run.invoker on the target service to the job's OIDC subject, or point the job at the declared subject".to_string()
            }
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::ResourceAbsent { kind, name } => {
                write!(f, "ResourceAbsent({}, {})", kind, name)
            }
            Finding::AttributeMismatch {
                kind,
                name,
                field,
                actual,
                expected,
            } => write!(
                f,
                "AttributeMismatch({}, {}, {}, actual='{}', expected='{}')",
                kind, name, field, actual, expected
            ),
            Finding::BindingMissing {
                subject,
                role,
                scope,
            } => write!(f, "BindingMissing({}, {}, {})", subject, role, scope),
            Finding::BindingOrphaned {
                subject,
                role,
                scope,
            } => write!(f, "BindingOrphaned({}, {}, {})", subject, role, scope),
            Finding::CrossEntityViolation { description } => {
                write!(f, "CrossEntityViolation({})", description)
            }
        }
    }
}

/// A resource that could not be compared because the control plane was unreachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unverifiable {
    pub kind: ResourceKind,
    pub name: String,
    pub error: String,
}

/// Result of comparing a snapshot to an expectation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Audit {
    pub findings: Vec<Finding>,
    pub unverifiable: Vec<Unverifiable>,
}

impl Audit {
    fn push(&mut self, finding: Finding) {
        if !self.findings.contains(&finding) {
            self.findings.push(finding);
        }
    }

    fn unreachable(&mut self, kind: ResourceKind, name: &str, error: &str) {
        let entry = Unverifiable {
            kind,
            name: name.to_string(),
            error: error.to_string(),
        };
        if !self.unverifiable.contains(&entry) {
            self.unverifiable.push(entry);
        }
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == Severity::Error)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.unverifiable.is_empty()
    }
}

struct Differ<'a> {
    config: &'a TrustConfig,
    expectation: &'a Expectation,
    snapshot: &'a Snapshot,
}

impl<'a> Differ<'a> {
    fn service_accounts(&self, audit: &mut Audit) {
        for email in &self.expectation.service_accounts {
            match self.snapshot.service_accounts.get(email) {
                Some(Fetched::Present(account)) => {
                    if account.disabled {
                        audit.push(Finding::mismatch(
                            ResourceKind::ServiceAccount,
                            email,
                            "disabled",
                            "true",
                            "false",
                        ));
                    }
                }
                Some(Fetched::NotFound) => audit.push(Finding::ResourceAbsent {
                    kind: ResourceKind::ServiceAccount,
                    name: email.clone(),
                }),
                Some(Fetched::Unreachable(e)) => {
                    audit.unreachable(ResourceKind::ServiceAccount, email, e)
                }
                None => {}
            }
        }
    }

    fn pool(&self, audit: &mut Audit) {
        let pool_id = &self.expectation.pool.pool_id;
        match &self.snapshot.pool {
            Fetched::Present(pool) => {
                if pool.state == LifecycleState::Deleted {
                    audit.push(Finding::mismatch(
                        ResourceKind::IdentityPool,
                        pool_id,
                        "state",
                        pool.state.to_string(),
                        LifecycleState::Active.to_string(),
                    ));
                }
                if pool.disabled {
                    audit.push(Finding::mismatch(
                        ResourceKind::IdentityPool,
                        pool_id,
                        "disabled",
                        "true",
                        "false",
                    ));
                }
            }
            Fetched::NotFound => audit.push(Finding::ResourceAbsent {
                kind: ResourceKind::IdentityPool,
                name: pool_id.clone(),
            }),
            Fetched::Unreachable(e) => audit.unreachable(ResourceKind::IdentityPool, pool_id, e),
        }
    }

    fn provider(&self, audit: &mut Audit) {
        let expected = &self.expectation.provider;
        let name = &expected.provider_id;
        let provider = match &self.snapshot.provider {
            Fetched::Present(provider) => provider,
            Fetched::NotFound => {
                audit.push(Finding::ResourceAbsent {
                    kind: ResourceKind::IdentityProvider,
                    name: name.clone(),
                });
                return;
            }
            Fetched::Unreachable(e) => {
                audit.unreachable(ResourceKind::IdentityProvider, name, e);
                return;
            }
        };

        let kind = ResourceKind::IdentityProvider;
        if provider.state == LifecycleState::Deleted {
            audit.push(Finding::mismatch(
                kind,
                name,
                "state",
                provider.state.to_string(),
                LifecycleState::Active.to_string(),
            ));
        }
        if provider.disabled {
            audit.push(Finding::mismatch(kind, name, "disabled", "true", "false"));
        }
        if provider.issuer_uri != expected.issuer_uri {
            audit.push(Finding::mismatch(
                kind,
                name,
                "issuerUri",
                provider.issuer_uri.clone(),
                expected.issuer_uri.clone(),
            ));
        }
        if provider.attribute_mapping != expected.attribute_mapping {
            let render = |m: &std::collections::BTreeMap<String, String>| {
                m.iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(",")
            };
            audit.push(Finding::mismatch(
                kind,
                name,
                "attributeMapping",
                render(&provider.attribute_mapping),
                render(&expected.attribute_mapping),
            ));
        }
        if !condition::is_equivalent(
            provider.attribute_condition.as_deref(),
            &expected.attribute_condition,
        ) {
            audit.push(Finding::mismatch(
                kind,
                name,
                "attributeCondition",
                provider
                    .attribute_condition
                    .clone()
                    .unwrap_or_else(|| "<none>".to_string()),
                expected.attribute_condition.clone(),
            ));
        }
    }

    fn secret(&self, audit: &mut Audit) {
        let name = &self.config.secret.name;
        match &self.snapshot.secret {
            Fetched::Present(_) => {}
            Fetched::NotFound => audit.push(Finding::ResourceAbsent {
                kind: ResourceKind::Secret,
                name: name.clone(),
            }),
            Fetched::Unreachable(e) => audit.unreachable(ResourceKind::Secret, name, e),
        }
    }

    fn services(&self, audit: &mut Audit) {
        for name in &self.config.services {
            match self.snapshot.services.get(name) {
                Some(Fetched::NotFound) => audit.push(Finding::ResourceAbsent {
                    kind: ResourceKind::RunService,
                    name: name.clone(),
                }),
                Some(Fetched::Unreachable(e)) => {
                    audit.unreachable(ResourceKind::RunService, name, e)
                }
                _ => {}
            }
        }
    }

    fn bindings(&self, audit: &mut Audit) {
        for binding in &self.expectation.bindings {
            let scope = &binding.scope;
            if self.snapshot.scope_is_absent(scope) {
                // Service accounts are created by the fix run, so their bindings are still
                // reported. Secrets and services are never created here.
                if scope.kind() == ResourceKind::ServiceAccount {
                    audit.push(Finding::BindingMissing {
                        subject: binding.member.clone(),
                        role: binding.role.clone(),
                        scope: scope.clone(),
                    });
                }
                continue;
            }
            match self.snapshot.policy_for(scope) {
                Some(Fetched::Present(policy)) => {
                    if !policy.has(&binding.role, &binding.member) {
                        audit.push(Finding::BindingMissing {
                            subject: binding.member.clone(),
                            role: binding.role.clone(),
                            scope: scope.clone(),
                        });
                    }
                }
                Some(Fetched::NotFound) => audit.push(Finding::BindingMissing {
                    subject: binding.member.clone(),
                    role: binding.role.clone(),
                    scope: scope.clone(),
                }),
                Some(Fetched::Unreachable(e)) => {
                    audit.unreachable(scope.kind(), scope.resource_name(), e)
                }
                None => {}
            }
        }
    }

    /// Principals under the declared pool whose repository is no longer declared
    fn orphans(&self, audit: &mut Audit) {
        let project_number = self.expectation.project_number;
        let pool_id = &self.expectation.pool.pool_id;
        for (scope, policy) in self.snapshot.policies(self.config) {
            let Fetched::Present(policy) = policy else {
                continue;
            };
            for (role, member) in policy.pairs() {
                let Member::PrincipalSet(principal) = Member::parse(member) else {
                    continue;
                };
                if principal.is_repository_principal_of(project_number, pool_id)
                    && !self.expectation.declares_repository(&principal.value)
                {
                    audit.push(Finding::BindingOrphaned {
                        subject: member.to_string(),
                        role: role.to_string(),
                        scope: scope.clone(),
                    });
                }
            }
        }
    }

    fn scheduler(&self, audit: &mut Audit) {
        let (Some(expected), Some(fetched)) =
            (&self.expectation.scheduler_job, &self.snapshot.scheduler_job)
        else {
            return;
        };
        let name = &expected.name;
        let job = match fetched {
            Fetched::Present(job) => job,
            Fetched::NotFound => {
                audit.push(Finding::ResourceAbsent {
                    kind: ResourceKind::SchedulerJob,
                    name: name.clone(),
                });
                return;
            }
            Fetched::Unreachable(e) => {
                audit.unreachable(ResourceKind::SchedulerJob, name, e);
                return;
            }
        };

        for field in SchedulerField::ALL {
            let actual = field.value_of(job);
            let wanted = field.value_of(expected);
            if actual != wanted {
                audit.push(Finding::mismatch(
                    ResourceKind::SchedulerJob,
                    name,
                    field.as_str(),
                    actual,
                    wanted,
                ));
            }
        }

        let subject = job.oidc_service_account.as_deref();
        for violation in invoker_violations(self.config, self.snapshot, &job.uri, subject, name) {
            audit.push(violation);
        }
    }
}

/// Check that the job's configured subject may invoke the service its URI targets
///
/// This is checked against the job's *live* subject, independently of whether that
/// subject is the expected one.
pub fn invoker_violations(
    config: &TrustConfig,
    snapshot: &Snapshot,
    uri: &str,
    subject: Option<&str>,
    job_name: &str,
) -> Vec<Finding> {
    let Some(subject) = subject else {
        return vec![Finding::CrossEntityViolation {
            description: format!("scheduler job '{}' has no OIDC identity configured", job_name),
        }];
    };
    let Some(service) = target_service_from_uri(uri, &config.services) else {
        return vec![Finding::CrossEntityViolation {
            description: format!(
                "could not determine target service from URI '{}' of scheduler job '{}'",
                uri, job_name
            ),
        }];
    };

    let member = service_account_member(subject);
    match snapshot.service_policies.get(&service) {
        Some(Fetched::Present(policy)) if policy.has(ROLE_RUN_INVOKER, &member) => vec![],
        Some(Fetched::Present(_)) => vec![Finding::CrossEntityViolation {
            description: format!(
                "scheduler job '{}' subject {} lacks {} on service '{}'",
                job_name, subject, ROLE_RUN_INVOKER, service
            ),
        }],
        Some(Fetched::NotFound) => vec![Finding::CrossEntityViolation {
            description: format!(
                "scheduler job '{}' targets service '{}', which does not exist",
                job_name, service
            ),
        }],
        // Reported as unverifiable by the binding check
        Some(Fetched::Unreachable(_)) => vec![],
        None => vec![Finding::CrossEntityViolation {
            description: format!(
                "scheduler job '{}' targets service '{}', which is not a declared service",
                job_name, service
            ),
        }],
    }
}

/// Compare `snapshot` to `expectation`
///
/// Findings are independent: an absent resource only short-circuits the
/// attribute checks of that same resource.
pub fn diff(config: &TrustConfig, expectation: &Expectation, snapshot: &Snapshot) -> Audit {
    let differ = Differ {
        config,
        expectation,
        snapshot,
    };
    let mut audit = Audit::default();

    if let Fetched::Unreachable(e) = &snapshot.project_policy {
        audit.unreachable(ResourceKind::Project, &config.project_id, e);
    }
    differ.service_accounts(&mut audit);
    differ.pool(&mut audit);
    differ.provider(&mut audit);
    differ.secret(&mut audit);
    differ.services(&mut audit);
    differ.bindings(&mut audit);
    differ.orphans(&mut audit);
    differ.scheduler(&mut audit);

    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config;
    use crate::engine::expectation::{expected, ROLE_SECRET_ACCESSOR, ROLE_WORKLOAD_IDENTITY_USER};
    use crate::engine::snapshot::SnapshotLoader;
    use crate::gcp::fake::FakeControlPlane;
    use crate::gcp::ControlPlane;

    async fn audit_of(fake: &FakeControlPlane, config: &TrustConfig) -> Audit {
        let snapshot = SnapshotLoader::new(fake, config).load().await;
        let expectation = expected(config, snapshot.project_number().unwrap());
        diff(config, &expectation, &snapshot)
    }

    #[tokio::test]
    async fn test_matching_state_has_no_findings() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let audit = audit_of(&fake, &config).await;
        assert_eq!(audit, Audit::default());
    }

    #[tokio::test]
    async fn test_absent_provider_skips_attribute_checks() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.remove_provider(&config.federation.pool_id, &config.federation.provider_id);

        let audit = audit_of(&fake, &config).await;
        assert_eq!(
            audit.findings,
            vec![Finding::ResourceAbsent {
                kind: ResourceKind::IdentityProvider,
                name: "github-provider".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_wrong_condition_is_an_error() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.set_provider_condition(
            &config.federation.pool_id,
            &config.federation.provider_id,
            Some("attribute.repository=='hordia/other'"),
        );

        let audit = audit_of(&fake, &config).await;
        assert_eq!(audit.findings.len(), 1);
        let finding = &audit.findings[0];
        assert!(matches!(
            finding,
            Finding::AttributeMismatch { field, .. } if field == "attributeCondition"
        ));
        assert_eq!(finding.severity(), Severity::Error);
    }

    #[tokio::test]
    async fn test_missing_condition_is_reported() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.set_provider_condition(&config.federation.pool_id, &config.federation.provider_id, None);

        let audit = audit_of(&fake, &config).await;
        assert!(audit.findings.iter().any(|f| matches!(
            f,
            Finding::AttributeMismatch { actual, .. } if actual == "<none>"
        )));
    }

    #[tokio::test]
    async fn test_scheduler_method_mismatch_is_single_finding() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.set_job_method("nightly-rescore", "GET");

        let audit = audit_of(&fake, &config).await;
        assert_eq!(
            audit.findings,
            vec![Finding::AttributeMismatch {
                kind: ResourceKind::SchedulerJob,
                name: "nightly-rescore".to_string(),
                field: "httpMethod".to_string(),
                actual: "GET".to_string(),
                expected: "POST".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_binding() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let scope = Scope::Secret {
            project_id: config.project_id.clone(),
            name: config.secret.name.clone(),
        };
        let member = "serviceAccount:engine-runtime@hordia-prod.iam.gserviceaccount.com";
        fake.remove_binding(&scope, ROLE_SECRET_ACCESSOR, member)
            .await
            .unwrap();

        let audit = audit_of(&fake, &config).await;
        assert_eq!(
            audit.findings,
            vec![Finding::BindingMissing {
                subject: member.to_string(),
                role: ROLE_SECRET_ACCESSOR.to_string(),
                scope,
            }]
        );
    }

    #[tokio::test]
    async fn test_orphan_detection_is_exact() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let sa_scope = Scope::ServiceAccount {
            project_id: config.project_id.clone(),
            email: config.service_account_email(),
        };
        let staging = "principalSet://iam.googleapis.com/projects/123456/locations/global/workloadIdentityPools/github-pool/attribute.repository/hordia/trust-engine-v2-staging";
        fake.add_binding(&sa_scope, ROLE_WORKLOAD_IDENTITY_USER, staging)
            .await
            .unwrap();

        let mut config_with_staging = config.clone();
        config_with_staging
            .federation
            .repositories
            .push("hordia/trust-engine-v2-staging".to_string());
        // staging is declared here, so nothing is orphaned even though the
        // current repository name is a prefix of it
        let fake_staging = FakeControlPlane::matching(&config_with_staging, 123456);
        let audit = audit_of(&fake_staging, &config_with_staging).await;
        assert!(audit
            .findings
            .iter()
            .all(|f| !matches!(f, Finding::BindingOrphaned { .. })));

        // Only staging is reported when it is undeclared; the current principal never is
        let audit = audit_of(&fake, &config).await;
        let orphans: Vec<_> = audit
            .findings
            .iter()
            .filter(|f| matches!(f, Finding::BindingOrphaned { .. }))
            .collect();
        assert_eq!(orphans.len(), 1);
        assert!(matches!(
            orphans[0],
            Finding::BindingOrphaned { subject, .. } if subject == staging
        ));
        assert_eq!(orphans[0].severity(), Severity::Warning);
    }

    #[tokio::test]
    async fn test_principal_in_other_pool_is_not_orphaned() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let sa_scope = Scope::ServiceAccount {
            project_id: config.project_id.clone(),
            email: config.service_account_email(),
        };
        fake.add_binding(
            &sa_scope,
            ROLE_WORKLOAD_IDENTITY_USER,
            "principalSet://iam.googleapis.com/projects/123456/locations/global/workloadIdentityPools/gitlab-pool/attribute.repository/org/x",
        )
        .await
        .unwrap();

        let audit = audit_of(&fake, &config).await;
        assert!(audit.findings.is_empty());
    }

    #[tokio::test]
    async fn test_cross_entity_violation_for_wrong_subject() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.set_job_subject("nightly-rescore", Some("intruder@hordia-prod.iam.gserviceaccount.com"));

        let audit = audit_of(&fake, &config).await;
        assert!(audit.findings.iter().any(|f| matches!(
            f,
            Finding::AttributeMismatch { field, .. } if field == "oidcToken.serviceAccountEmail"
        )));
        assert!(audit
            .findings
            .iter()
            .any(|f| matches!(f, Finding::CrossEntityViolation { description } if description.contains("intruder"))));
    }

    #[tokio::test]
    async fn test_unparseable_target_uri_is_a_violation() {
        let mut config = config::sample();
        if let Some(s) = config.scheduler.as_mut() {
            s.uri = "https://example.com/hook".to_string();
        }
        let fake = FakeControlPlane::matching(&config, 123456);

        let audit = audit_of(&fake, &config).await;
        assert_eq!(
            audit.findings,
            vec![Finding::CrossEntityViolation {
                description: "could not determine target service from URI 'https://example.com/hook' of scheduler job 'nightly-rescore'".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_policy_is_unverifiable() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.fail_operation("get_iam_policy");

        let audit = audit_of(&fake, &config).await;
        assert!(audit.findings.is_empty());
        assert!(!audit.unverifiable.is_empty());
        assert!(!audit.is_clean());
    }
}
