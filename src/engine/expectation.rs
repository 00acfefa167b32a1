use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::condition;
use super::config::TrustConfig;
use super::principal::{scheduler_service_agent, service_account_member, PrincipalSet};
use crate::gcp::{PoolSpec, ProviderSpec, SchedulerJob, Scope};

pub const ROLE_WORKLOAD_IDENTITY_USER: &str = "roles/iam.workloadIdentityUser";
pub const ROLE_TOKEN_CREATOR: &str = "roles/iam.serviceAccountTokenCreator";
pub const ROLE_RUN_INVOKER: &str = "roles/run.invoker";
pub const ROLE_SECRET_ACCESSOR: &str = "roles/secretmanager.secretAccessor";

/// A `(member, role, scope)` edge of the trust graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoleBinding {
    pub member: String,
    pub role: String,
    pub scope: Scope,
}

impl RoleBinding {
    pub fn new(member: impl Into<String>, role: &str, scope: Scope) -> Self {
        Self {
            member: member.into(),
            role: role.to_string(),
            scope,
        }
    }
}

impl fmt::Display for RoleBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} on {}", self.member, self.role, self.scope)
    }
}

/// Everything the live state is expected to contain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expectation {
    pub project_number: u64,
    pub service_account_email: String,
    /// Service accounts that must exist, CI account first
    pub service_accounts: Vec<String>,
    pub project_roles: BTreeSet<String>,
    pub pool: PoolSpec,
    pub provider: ProviderSpec,
    /// One principal per declared repository
    pub principals: Vec<PrincipalSet>,
    pub bindings: BTreeSet<RoleBinding>,
    /// Members that must hold the secret accessor role
    pub secret_accessors: BTreeSet<String>,
    pub scheduler_job: Option<SchedulerJob>,
}

impl Expectation {
    /// Whether `repository` is one of the declared repositories
    pub fn declares_repository(&self, repository: &str) -> bool {
        self.principals.iter().any(|p| p.value == repository)
    }
}

/// Compute the expected state for `config`
///
/// `project_number` must be the resolved numeric project number of the pool's
/// project. It is never derived from the project id.
pub fn expected(config: &TrustConfig, project_number: u64) -> Expectation {
    let project_id = config.project_id.clone();
    let sa_email = config.service_account_email();
    let sa_member = service_account_member(&sa_email);
    let federation = &config.federation;

    let principals: Vec<PrincipalSet> = federation
        .repositories
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|repo| PrincipalSet::for_repository(project_number, &federation.pool_id, repo))
        .collect();

    let mut bindings = BTreeSet::new();

    let project_scope = Scope::Project {
        project_id: project_id.clone(),
    };
    let project_roles: BTreeSet<String> = config.service_account.roles.iter().cloned().collect();
    for role in &project_roles {
        bindings.insert(RoleBinding::new(&sa_member, role, project_scope.clone()));
    }

    let sa_scope = Scope::ServiceAccount {
        project_id: project_id.clone(),
        email: sa_email.clone(),
    };
    for principal in &principals {
        bindings.insert(RoleBinding::new(
            principal.to_string(),
            ROLE_WORKLOAD_IDENTITY_USER,
            sa_scope.clone(),
        ));
    }

    let secret_scope = Scope::Secret {
        project_id: project_id.clone(),
        name: config.secret.name.clone(),
    };
    let secret_accessors: BTreeSet<String> = std::iter::once(sa_email.clone())
        .chain(config.secret.accessors.iter().cloned())
        .map(|email| service_account_member(&email))
        .collect();
    for member in &secret_accessors {
        bindings.insert(RoleBinding::new(
            member,
            ROLE_SECRET_ACCESSOR,
            secret_scope.clone(),
        ));
    }

    let scheduler_job = match (&config.scheduler, config.scheduler_subject()) {
        (Some(scheduler), Some(subject)) => {
            let subject_scope = Scope::ServiceAccount {
                project_id: project_id.clone(),
                email: subject.clone(),
            };
            bindings.insert(RoleBinding::new(
                service_account_member(&scheduler_service_agent(project_number)),
                ROLE_TOKEN_CREATOR,
                subject_scope,
            ));

            let subject_member = service_account_member(&subject);
            for service in &config.services {
                bindings.insert(RoleBinding::new(
                    &subject_member,
                    ROLE_RUN_INVOKER,
                    Scope::RunService {
                        project_id: project_id.clone(),
                        region: config.region.clone(),
                        name: service.clone(),
                    },
                ));
            }

            Some(SchedulerJob {
                name: scheduler.job.clone(),
                region: scheduler.region.clone(),
                http_method: scheduler.http_method.to_uppercase(),
                uri: scheduler.uri.clone(),
                oidc_service_account: Some(subject),
                oidc_audience: scheduler.audience.clone(),
                schedule: scheduler.schedule.clone(),
                time_zone: scheduler.time_zone.clone(),
            })
        }
        _ => None,
    };

    Expectation {
        project_number,
        service_accounts: config.service_account_emails(),
        service_account_email: sa_email,
        project_roles,
        pool: PoolSpec {
            pool_id: federation.pool_id.clone(),
            display_name: federation.pool_display_name.clone(),
        },
        provider: ProviderSpec {
            pool_id: federation.pool_id.clone(),
            provider_id: federation.provider_id.clone(),
            issuer_uri: federation.issuer_uri.clone(),
            attribute_mapping: federation.attribute_mapping.clone(),
            attribute_condition: condition::render(&federation.repositories),
        },
        principals,
        bindings,
        secret_accessors,
        scheduler_job,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config;

    #[test]
    fn test_expected_is_deterministic() {
        let config = config::sample();
        assert_eq!(expected(&config, 123456), expected(&config, 123456));
    }

    #[test]
    fn test_principal_embeds_project_number() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        assert_eq!(
            expectation.principals[0].to_string(),
            "principalSet://iam.googleapis.com/projects/123456/locations/global/workloadIdentityPools/github-pool/attribute.repository/hordia/trust-engine-v2"
        );
        assert!(!expectation.principals[0].to_string().contains("hordia-prod"));
    }

    #[test]
    fn test_expected_bindings() {
        let config = config::sample();
        let expectation = expected(&config, 123456);
        let sa_scope = Scope::ServiceAccount {
            project_id: "hordia-prod".to_string(),
            email: "github-deployer@hordia-prod.iam.gserviceaccount.com".to_string(),
        };

        assert!(expectation.bindings.contains(&RoleBinding::new(
            expectation.principals[0].to_string(),
            ROLE_WORKLOAD_IDENTITY_USER,
            sa_scope.clone(),
        )));
        assert!(expectation.bindings.contains(&RoleBinding::new(
            "serviceAccount:service-123456@gcp-sa-cloudscheduler.iam.gserviceaccount.com",
            ROLE_TOKEN_CREATOR,
            sa_scope,
        )));

        let invokers = expectation
            .bindings
            .iter()
            .filter(|b| b.role == ROLE_RUN_INVOKER)
            .count();
        assert_eq!(invokers, config.services.len());

        // CI account plus the runtime account
        assert_eq!(expectation.secret_accessors.len(), 2);
        assert_eq!(expectation.project_roles.len(), 2);
    }

    #[test]
    fn test_no_scheduler_means_no_scheduler_edges() {
        let mut config = config::sample();
        config.scheduler = None;
        let expectation = expected(&config, 1);
        assert!(expectation.scheduler_job.is_none());
        assert!(expectation
            .bindings
            .iter()
            .all(|b| b.role != ROLE_RUN_INVOKER && b.role != ROLE_TOKEN_CREATOR));
    }

    #[test]
    fn test_provider_condition_matches_repositories() {
        let mut config = config::sample();
        config.federation.repositories = vec!["org/a".to_string(), "org/b".to_string()];
        let expectation = expected(&config, 1);
        assert_eq!(
            expectation.provider.attribute_condition,
            "attribute.repository in ['org/a', 'org/b']"
        );
        assert_eq!(expectation.principals.len(), 2);
        assert!(expectation.declares_repository("org/b"));
        assert!(!expectation.declares_repository("org/c"));
    }
}
