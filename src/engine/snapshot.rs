use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::config::TrustConfig;
use crate::gcp::{
    ControlPlane, ControlPlaneError, CpResult, IdentityPool, IdentityProvider, Policy,
    ProjectInfo, ResourceKind, RunService, SchedulerJob, Scope, Secret, ServiceAccount,
};

/// Outcome of fetching one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Fetched<T> {
    Present(T),
    /// The resource does not exist. A valid state, not an error.
    NotFound,
    /// The control plane could not be asked. Invalidates comparisons for this resource only.
    Unreachable(String),
}

impl<T> Fetched<T> {
    pub fn from_result(result: CpResult<T>) -> Self {
        match result {
            Ok(value) => Fetched::Present(value),
            Err(ControlPlaneError::NotFound { .. }) => Fetched::NotFound,
            Err(e) => Fetched::Unreachable(e.to_string()),
        }
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Fetched::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Fetched::NotFound)
    }
}

/// Live state of every resource the trust configuration touches
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub project: Fetched<ProjectInfo>,
    pub project_policy: Fetched<Policy>,
    /// Keyed by email
    pub service_accounts: BTreeMap<String, Fetched<ServiceAccount>>,
    /// Keyed by email
    pub service_account_policies: BTreeMap<String, Fetched<Policy>>,
    pub pool: Fetched<IdentityPool>,
    pub provider: Fetched<IdentityProvider>,
    pub secret: Fetched<Secret>,
    pub secret_policy: Fetched<Policy>,
    /// Keyed by service name
    pub services: BTreeMap<String, Fetched<RunService>>,
    /// Keyed by service name
    pub service_policies: BTreeMap<String, Fetched<Policy>>,
    /// `None` when no scheduler job is declared
    pub scheduler_job: Option<Fetched<SchedulerJob>>,
}

impl Snapshot {
    /// Numeric project number, preferring the one embedded in the pool resource
    pub fn project_number(&self) -> Option<u64> {
        self.pool
            .present()
            .map(|p| p.project_number)
            .filter(|n| *n != 0)
            .or_else(|| self.project.present().map(|p| p.project_number))
    }

    /// The fetched policy for `scope`, if the snapshot covers that scope
    pub fn policy_for(&self, scope: &Scope) -> Option<&Fetched<Policy>> {
        match scope {
            Scope::Project { .. } => Some(&self.project_policy),
            Scope::ServiceAccount { email, .. } => self.service_account_policies.get(email),
            Scope::Secret { .. } => Some(&self.secret_policy),
            Scope::RunService { name, .. } => self.service_policies.get(name),
        }
    }

    /// Whether the resource behind `scope` is known to be absent
    pub fn scope_is_absent(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Project { .. } => false,
            Scope::ServiceAccount { email, .. } => self
                .service_accounts
                .get(email)
                .is_some_and(Fetched::is_not_found),
            Scope::Secret { .. } => self.secret.is_not_found(),
            Scope::RunService { name, .. } => {
                self.services.get(name).is_some_and(Fetched::is_not_found)
            }
        }
    }

    /// Every fetched policy together with its scope
    pub fn policies(&self, config: &TrustConfig) -> Vec<(Scope, &Fetched<Policy>)> {
        let mut out = vec![(
            Scope::Project {
                project_id: config.project_id.clone(),
            },
            &self.project_policy,
        )];
        for (email, policy) in &self.service_account_policies {
            out.push((
                Scope::ServiceAccount {
                    project_id: config.project_id.clone(),
                    email: email.clone(),
                },
                policy,
            ));
        }
        out.push((
            Scope::Secret {
                project_id: config.project_id.clone(),
                name: config.secret.name.clone(),
            },
            &self.secret_policy,
        ));
        for (name, policy) in &self.service_policies {
            out.push((
                Scope::RunService {
                    project_id: config.project_id.clone(),
                    region: config.region.clone(),
                    name: name.clone(),
                },
                policy,
            ));
        }
        out
    }
}

/// Fetches snapshots through the control plane
///
/// Reads are independent and run concurrently. The loader never fails as a whole:
/// every error lands in the corresponding [`Fetched`] slot.
pub struct SnapshotLoader<'a> {
    client: &'a dyn ControlPlane,
    config: &'a TrustConfig,
}

impl<'a> SnapshotLoader<'a> {
    pub fn new(client: &'a dyn ControlPlane, config: &'a TrustConfig) -> Self {
        Self { client, config }
    }

    fn project_scope(&self) -> Scope {
        Scope::Project {
            project_id: self.config.project_id.clone(),
        }
    }

    fn secret_scope(&self) -> Scope {
        Scope::Secret {
            project_id: self.config.project_id.clone(),
            name: self.config.secret.name.clone(),
        }
    }

    fn service_scope(&self, name: &str) -> Scope {
        Scope::RunService {
            project_id: self.config.project_id.clone(),
            region: self.config.region.clone(),
            name: name.to_string(),
        }
    }

    async fn load_project(&self) -> (Fetched<ProjectInfo>, Fetched<Policy>) {
        let scope = self.project_scope();
        let (project, policy) = tokio::join!(
            self.client.describe_project(&self.config.project_id),
            self.client.get_iam_policy(&scope),
        );
        (Fetched::from_result(project), Fetched::from_result(policy))
    }

    async fn load_service_accounts(
        &self,
    ) -> (
        BTreeMap<String, Fetched<ServiceAccount>>,
        BTreeMap<String, Fetched<Policy>>,
    ) {
        let emails = self.config.service_account_emails();
        let fetches = emails.iter().map(|email| async move {
            let scope = Scope::ServiceAccount {
                project_id: self.config.project_id.clone(),
                email: email.clone(),
            };
            let (account, policy) = tokio::join!(
                self.client.describe_service_account(email),
                self.client.get_iam_policy(&scope),
            );
            (
                email.clone(),
                Fetched::from_result(account),
                Fetched::from_result(policy),
            )
        });

        let mut accounts = BTreeMap::new();
        let mut policies = BTreeMap::new();
        for (email, account, policy) in join_all(fetches).await {
            accounts.insert(email.clone(), account);
            policies.insert(email, policy);
        }
        (accounts, policies)
    }

    async fn load_pool(&self) -> Fetched<IdentityPool> {
        Fetched::from_result(
            self.client
                .describe_pool(&self.config.project_id, &self.config.federation.pool_id)
                .await,
        )
    }

    async fn load_provider(&self) -> Fetched<IdentityProvider> {
        let federation = &self.config.federation;
        Fetched::from_result(
            self.client
                .describe_provider(
                    &self.config.project_id,
                    &federation.pool_id,
                    &federation.provider_id,
                )
                .await,
        )
    }

    async fn load_secret(&self) -> (Fetched<Secret>, Fetched<Policy>) {
        let scope = self.secret_scope();
        let (secret, policy) = tokio::join!(
            self.client
                .describe_secret(&self.config.project_id, &self.config.secret.name),
            self.client.get_iam_policy(&scope),
        );
        (Fetched::from_result(secret), Fetched::from_result(policy))
    }

    async fn load_services(
        &self,
    ) -> (
        BTreeMap<String, Fetched<RunService>>,
        BTreeMap<String, Fetched<Policy>>,
    ) {
        let fetches = self.config.services.iter().map(|name| async move {
            let scope = self.service_scope(name);
            let (service, policy) = tokio::join!(
                self.client
                    .describe_run_service(&self.config.project_id, &self.config.region, name),
                self.client.get_iam_policy(&scope),
            );
            (
                name.clone(),
                Fetched::from_result(service),
                Fetched::from_result(policy),
            )
        });

        let mut services = BTreeMap::new();
        let mut policies = BTreeMap::new();
        for (name, service, policy) in join_all(fetches).await {
            services.insert(name.clone(), service);
            policies.insert(name, policy);
        }
        (services, policies)
    }

    async fn load_scheduler_job(&self) -> Option<Fetched<SchedulerJob>> {
        let scheduler = self.config.scheduler.as_ref()?;
        Some(Fetched::from_result(
            self.client
                .describe_scheduler_job(&self.config.project_id, &scheduler.region, &scheduler.job)
                .await,
        ))
    }

    /// Fetch the full snapshot
    pub async fn load(&self) -> Snapshot {
        debug!(project = %self.config.project_id, "Loading snapshot");
        let (
            (project, project_policy),
            (service_accounts, service_account_policies),
            pool,
            provider,
            (secret, secret_policy),
            (services, service_policies),
            scheduler_job,
        ) = tokio::join!(
            self.load_project(),
            self.load_service_accounts(),
            self.load_pool(),
            self.load_provider(),
            self.load_secret(),
            self.load_services(),
            self.load_scheduler_job(),
        );

        let snapshot = Snapshot {
            project,
            project_policy,
            service_accounts,
            service_account_policies,
            pool,
            provider,
            secret,
            secret_policy,
            services,
            service_policies,
            scheduler_job,
        };
        if snapshot.project_number().is_none() {
            warn!(
                project = %self.config.project_id,
                "Project number could not be resolved from the pool or the project"
            );
        }
        snapshot
    }

    /// Re-fetch only the resources of the given kinds
    pub async fn refresh(&self, snapshot: &mut Snapshot, kinds: &BTreeSet<ResourceKind>) {
        debug!(?kinds, "Refreshing snapshot");
        for kind in kinds {
            match kind {
                ResourceKind::Project => {
                    (snapshot.project, snapshot.project_policy) = self.load_project().await;
                }
                ResourceKind::ServiceAccount => {
                    (
                        snapshot.service_accounts,
                        snapshot.service_account_policies,
                    ) = self.load_service_accounts().await;
                }
                ResourceKind::IdentityPool => snapshot.pool = self.load_pool().await,
                ResourceKind::IdentityProvider => snapshot.provider = self.load_provider().await,
                ResourceKind::Secret => {
                    (snapshot.secret, snapshot.secret_policy) = self.load_secret().await;
                }
                ResourceKind::RunService => {
                    (snapshot.services, snapshot.service_policies) = self.load_services().await;
                }
                ResourceKind::SchedulerJob => {
                    snapshot.scheduler_job = self.load_scheduler_job().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config;
    use crate::gcp::fake::FakeControlPlane;

    #[tokio::test]
    async fn test_absent_resources_are_not_found() {
        let config = config::sample();
        let fake = FakeControlPlane::new(&config.project_id, 123456);
        let snapshot = SnapshotLoader::new(&fake, &config).load().await;

        assert!(snapshot.pool.is_not_found());
        assert!(snapshot.provider.is_not_found());
        assert!(snapshot.secret.is_not_found());
        assert!(snapshot
            .service_accounts
            .values()
            .all(Fetched::is_not_found));
        assert!(matches!(snapshot.scheduler_job, Some(Fetched::NotFound)));
        // The project itself always exists
        assert_eq!(snapshot.project_number(), Some(123456));
    }

    #[tokio::test]
    async fn test_unreachable_is_isolated_to_one_resource() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.fail_operation("describe_provider");

        let snapshot = SnapshotLoader::new(&fake, &config).load().await;
        assert!(matches!(snapshot.provider, Fetched::Unreachable(_)));
        assert!(snapshot.pool.present().is_some());
        assert!(snapshot.secret.present().is_some());
    }

    #[tokio::test]
    async fn test_project_number_prefers_pool() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.fail_operation("describe_project");

        let snapshot = SnapshotLoader::new(&fake, &config).load().await;
        assert!(matches!(snapshot.project, Fetched::Unreachable(_)));
        assert_eq!(snapshot.project_number(), Some(123456));
    }

    #[tokio::test]
    async fn test_refresh_only_touches_requested_kinds() {
        let config = config::sample();
        let fake = FakeControlPlane::new(&config.project_id, 123456);
        let loader = SnapshotLoader::new(&fake, &config);
        let mut snapshot = loader.load().await;
        assert!(snapshot.pool.is_not_found());

        let seeded = FakeControlPlane::matching(&config, 123456);
        let loader = SnapshotLoader::new(&seeded, &config);
        loader
            .refresh(&mut snapshot, &BTreeSet::from([ResourceKind::IdentityPool]))
            .await;

        assert!(snapshot.pool.present().is_some());
        assert!(snapshot.provider.is_not_found());
    }
}
