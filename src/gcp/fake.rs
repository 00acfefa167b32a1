//! In-memory control plane used by the test-suite.
//!
//! Every mutating call is appended to a log so tests can assert that a run
//! against matching state issues no mutations at all. Deleting a provider
//! purges it immediately unless [`FakeControlPlane::keep_deleted_providers`]
//! is set, in which case it stays in `DELETED` state and keeps its id
//! reserved, as Google Cloud does.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{
    ControlPlane, ControlPlaneError, CpResult, IdentityPool, IdentityProvider, LifecycleState,
    Policy, PoolSpec, ProjectInfo, ProviderSpec, ResourceKind, RunService, SchedulerField,
    SchedulerJob, Scope, Secret, ServiceAccount,
};
use crate::engine::config::TrustConfig;
use crate::engine::expectation::expected;

#[derive(Default)]
struct State {
    service_accounts: BTreeMap<String, ServiceAccount>,
    pools: BTreeMap<String, IdentityPool>,
    providers: BTreeMap<(String, String), IdentityProvider>,
    secrets: BTreeMap<String, Secret>,
    services: BTreeMap<String, RunService>,
    jobs: BTreeMap<String, SchedulerJob>,
    policies: BTreeMap<Scope, Policy>,
    failing: BTreeSet<String>,
    keep_deleted_providers: bool,
    mutations: Vec<String>,
}

pub struct FakeControlPlane {
    project: ProjectInfo,
    state: Mutex<State>,
}

impl FakeControlPlane {
    /// An empty project: only the project itself and its (empty) policy exist
    pub fn new(project_id: &str, project_number: u64) -> Self {
        Self {
            project: ProjectInfo {
                project_id: project_id.to_string(),
                project_number,
            },
            state: Mutex::new(State::default()),
        }
    }

    /// A project whose live state matches `config` exactly
    pub fn matching(config: &TrustConfig, project_number: u64) -> Self {
        let fake = Self::new(&config.project_id, project_number);
        let expectation = expected(config, project_number);
        {
            let mut state = fake.lock();
            for email in &expectation.service_accounts {
                state
                    .service_accounts
                    .insert(email.clone(), service_account(email, "", false));
            }
            let pool = fake.pool_from_spec(&expectation.pool);
            state.pools.insert(pool.pool_id.clone(), pool);
            let provider = fake.provider_from_spec(&expectation.provider);
            state.providers.insert(
                (provider.pool_id.clone(), provider.provider_id.clone()),
                provider,
            );
            state.secrets.insert(
                config.secret.name.clone(),
                Secret {
                    name: config.secret.name.clone(),
                    resource_name: format!(
                        "projects/{}/secrets/{}",
                        project_number, config.secret.name
                    ),
                },
            );
            for name in &config.services {
                state.services.insert(
                    name.clone(),
                    RunService {
                        name: name.clone(),
                        region: config.region.clone(),
                        uri: Some(format!(
                            "https://{}-{}.{}.run.app",
                            name, project_number, config.region
                        )),
                    },
                );
            }
            if let Some(job) = &expectation.scheduler_job {
                state.jobs.insert(job.name.clone(), job.clone());
            }
            for binding in &expectation.bindings {
                state
                    .policies
                    .entry(binding.scope.clone())
                    .or_default()
                    .grant(&binding.role, &binding.member);
            }
        }
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn pool_from_spec(&self, spec: &PoolSpec) -> IdentityPool {
        IdentityPool {
            pool_id: spec.pool_id.clone(),
            name: format!(
                "projects/{}/locations/global/workloadIdentityPools/{}",
                self.project.project_number, spec.pool_id
            ),
            project_number: self.project.project_number,
            display_name: spec.display_name.clone(),
            state: LifecycleState::Active,
            disabled: false,
        }
    }

    fn provider_from_spec(&self, spec: &ProviderSpec) -> IdentityProvider {
        IdentityProvider {
            pool_id: spec.pool_id.clone(),
            provider_id: spec.provider_id.clone(),
            name: format!(
                "projects/{}/locations/global/workloadIdentityPools/{}/providers/{}",
                self.project.project_number, spec.pool_id, spec.provider_id
            ),
            issuer_uri: spec.issuer_uri.clone(),
            attribute_mapping: spec.attribute_mapping.clone(),
            attribute_condition: Some(spec.attribute_condition.clone()),
            state: LifecycleState::Active,
            disabled: false,
        }
    }

    /// Make every call of `operation` fail as unreachable
    pub fn fail_operation(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    pub fn restore_operation(&self, operation: &str) {
        self.lock().failing.remove(operation);
    }

    /// Mutations issued so far, in order
    pub fn mutations(&self) -> Vec<String> {
        self.lock().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock().mutations.len()
    }

    pub fn clear_mutations(&self) {
        self.lock().mutations.clear();
    }

    pub fn policy(&self, scope: &Scope) -> Policy {
        self.lock().policies.get(scope).cloned().unwrap_or_default()
    }

    pub fn remove_service_account(&self, email: &str) {
        let mut state = self.lock();
        state.service_accounts.remove(email);
        state
            .policies
            .retain(|scope, _| !matches!(scope, Scope::ServiceAccount { email: e, .. } if e == email));
    }

    pub fn set_service_account_disabled(&self, email: &str, disabled: bool) {
        if let Some(account) = self.lock().service_accounts.get_mut(email) {
            account.disabled = disabled;
        }
    }

    pub fn remove_pool(&self, pool_id: &str) {
        self.lock().pools.remove(pool_id);
    }

    pub fn set_pool_state(&self, pool_id: &str, state: LifecycleState, disabled: bool) {
        if let Some(pool) = self.lock().pools.get_mut(pool_id) {
            pool.state = state;
            pool.disabled = disabled;
        }
    }

    pub fn remove_provider(&self, pool_id: &str, provider_id: &str) {
        self.lock()
            .providers
            .remove(&(pool_id.to_string(), provider_id.to_string()));
    }

    pub fn set_provider_condition(&self, pool_id: &str, provider_id: &str, condition: Option<&str>) {
        if let Some(provider) = self
            .lock()
            .providers
            .get_mut(&(pool_id.to_string(), provider_id.to_string()))
        {
            provider.attribute_condition = condition.map(str::to_string);
        }
    }

    pub fn set_provider_state(&self, pool_id: &str, provider_id: &str, state: LifecycleState) {
        if let Some(provider) = self
            .lock()
            .providers
            .get_mut(&(pool_id.to_string(), provider_id.to_string()))
        {
            provider.state = state;
        }
    }

    /// Soft-delete providers from now on
    pub fn keep_deleted_providers(&self) {
        self.lock().keep_deleted_providers = true;
    }

    /// Add a provider that is not the declared one
    pub fn insert_provider(&self, provider: IdentityProvider) {
        self.lock().providers.insert(
            (provider.pool_id.clone(), provider.provider_id.clone()),
            provider,
        );
    }

    pub fn remove_secret(&self, name: &str) {
        let mut state = self.lock();
        state.secrets.remove(name);
        state
            .policies
            .retain(|scope, _| !matches!(scope, Scope::Secret { name: n, .. } if n == name));
    }

    pub fn remove_run_service(&self, name: &str) {
        let mut state = self.lock();
        state.services.remove(name);
        state
            .policies
            .retain(|scope, _| !matches!(scope, Scope::RunService { name: n, .. } if n == name));
    }

    pub fn remove_job(&self, name: &str) {
        self.lock().jobs.remove(name);
    }

    pub fn set_job_method(&self, name: &str, method: &str) {
        if let Some(job) = self.lock().jobs.get_mut(name) {
            job.http_method = method.to_string();
        }
    }

    pub fn set_job_subject(&self, name: &str, subject: Option<&str>) {
        if let Some(job) = self.lock().jobs.get_mut(name) {
            job.oidc_service_account = subject.map(str::to_string);
        }
    }

    pub fn set_job_schedule(&self, name: &str, schedule: &str) {
        if let Some(job) = self.lock().jobs.get_mut(name) {
            job.schedule = schedule.to_string();
        }
    }

    fn check(&self, operation: &str) -> CpResult<()> {
        if self.lock().failing.contains(operation) {
            return Err(ControlPlaneError::Unreachable {
                operation: operation.to_string(),
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, state: &mut State, entry: String) {
        state.mutations.push(entry);
    }

    fn scope_exists(&self, state: &State, scope: &Scope) -> bool {
        match scope {
            Scope::Project { project_id } => *project_id == self.project.project_id,
            Scope::ServiceAccount { email, .. } => state.service_accounts.contains_key(email),
            Scope::Secret { name, .. } => state.secrets.contains_key(name),
            Scope::RunService { name, .. } => state.services.contains_key(name),
        }
    }

    fn already_exists(operation: &str, name: &str) -> ControlPlaneError {
        ControlPlaneError::Api {
            operation: operation.to_string(),
            status: 409,
            message: format!("{} already exists", name),
        }
    }
}

fn service_account(email: &str, display_name: &str, disabled: bool) -> ServiceAccount {
    ServiceAccount {
        email: email.to_string(),
        unique_id: format!("1{:020}", email.len()),
        display_name: display_name.to_string(),
        disabled,
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn describe_project(&self, project_id: &str) -> CpResult<ProjectInfo> {
        self.check("describe_project")?;
        if project_id != self.project.project_id {
            return Err(ControlPlaneError::not_found(ResourceKind::Project, project_id));
        }
        Ok(self.project.clone())
    }

    async fn describe_service_account(&self, email: &str) -> CpResult<ServiceAccount> {
        self.check("describe_service_account")?;
        self.lock()
            .service_accounts
            .get(email)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::ServiceAccount, email))
    }

    async fn create_service_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> CpResult<ServiceAccount> {
        self.check("create_service_account")?;
        let email = format!("{}@{}.iam.gserviceaccount.com", account_id, project_id);
        let mut state = self.lock();
        if state.service_accounts.contains_key(&email) {
            return Err(Self::already_exists("create_service_account", &email));
        }
        let account = service_account(&email, display_name, false);
        state.service_accounts.insert(email.clone(), account.clone());
        self.record(&mut state, format!("create_service_account {}", email));
        Ok(account)
    }

    async fn enable_service_account(&self, email: &str) -> CpResult<()> {
        self.check("enable_service_account")?;
        let mut state = self.lock();
        let account = state
            .service_accounts
            .get_mut(email)
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::ServiceAccount, email))?;
        account.disabled = false;
        self.record(&mut state, format!("enable_service_account {}", email));
        Ok(())
    }

    async fn describe_pool(&self, _project_id: &str, pool_id: &str) -> CpResult<IdentityPool> {
        self.check("describe_pool")?;
        self.lock()
            .pools
            .get(pool_id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::IdentityPool, pool_id))
    }

    async fn create_pool(&self, _project_id: &str, spec: &PoolSpec) -> CpResult<IdentityPool> {
        self.check("create_pool")?;
        let mut state = self.lock();
        if state.pools.contains_key(&spec.pool_id) {
            return Err(Self::already_exists("create_pool", &spec.pool_id));
        }
        let pool = self.pool_from_spec(spec);
        state.pools.insert(spec.pool_id.clone(), pool.clone());
        self.record(&mut state, format!("create_pool {}", spec.pool_id));
        Ok(pool)
    }

    async fn enable_pool(&self, _project_id: &str, pool_id: &str) -> CpResult<()> {
        self.check("enable_pool")?;
        let mut state = self.lock();
        let pool = state
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::IdentityPool, pool_id))?;
        pool.disabled = false;
        self.record(&mut state, format!("enable_pool {}", pool_id));
        Ok(())
    }

    async fn undelete_pool(&self, _project_id: &str, pool_id: &str) -> CpResult<()> {
        self.check("undelete_pool")?;
        let mut state = self.lock();
        let pool = state
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::IdentityPool, pool_id))?;
        pool.state = LifecycleState::Active;
        self.record(&mut state, format!("undelete_pool {}", pool_id));
        Ok(())
    }

    async fn describe_provider(
        &self,
        _project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<IdentityProvider> {
        self.check("describe_provider")?;
        self.lock()
            .providers
            .get(&(pool_id.to_string(), provider_id.to_string()))
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::IdentityProvider, provider_id))
    }

    async fn list_providers(
        &self,
        _project_id: &str,
        pool_id: &str,
    ) -> CpResult<Vec<IdentityProvider>> {
        self.check("list_providers")?;
        let state = self.lock();
        if !state.pools.contains_key(pool_id) {
            return Err(ControlPlaneError::not_found(ResourceKind::IdentityPool, pool_id));
        }
        Ok(state
            .providers
            .values()
            .filter(|p| p.pool_id == pool_id)
            .cloned()
            .collect())
    }

    async fn create_provider(
        &self,
        _project_id: &str,
        spec: &ProviderSpec,
    ) -> CpResult<IdentityProvider> {
        self.check("create_provider")?;
        let mut state = self.lock();
        if !state.pools.contains_key(&spec.pool_id) {
            return Err(ControlPlaneError::not_found(
                ResourceKind::IdentityPool,
                &spec.pool_id,
            ));
        }
        let key = (spec.pool_id.clone(), spec.provider_id.clone());
        if state.providers.contains_key(&key) {
            return Err(Self::already_exists("create_provider", &spec.provider_id));
        }
        let provider = self.provider_from_spec(spec);
        state.providers.insert(key, provider.clone());
        self.record(&mut state, format!("create_provider {}", spec.provider_id));
        Ok(provider)
    }

    async fn delete_provider(
        &self,
        _project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<()> {
        self.check("delete_provider")?;
        let mut state = self.lock();
        let key = (pool_id.to_string(), provider_id.to_string());
        let not_found = || ControlPlaneError::not_found(ResourceKind::IdentityProvider, provider_id);
        if state.keep_deleted_providers {
            let provider = state.providers.get_mut(&key).ok_or_else(not_found)?;
            if provider.state == LifecycleState::Deleted {
                return Err(not_found());
            }
            provider.state = LifecycleState::Deleted;
        } else {
            state.providers.remove(&key).ok_or_else(not_found)?;
        }
        self.record(&mut state, format!("delete_provider {}", provider_id));
        Ok(())
    }

    async fn undelete_provider(
        &self,
        _project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<()> {
        self.check("undelete_provider")?;
        let mut state = self.lock();
        let provider = state
            .providers
            .get_mut(&(pool_id.to_string(), provider_id.to_string()))
            .ok_or_else(|| {
                ControlPlaneError::not_found(ResourceKind::IdentityProvider, provider_id)
            })?;
        provider.state = LifecycleState::Active;
        self.record(&mut state, format!("undelete_provider {}", provider_id));
        Ok(())
    }

    async fn describe_secret(&self, _project_id: &str, name: &str) -> CpResult<Secret> {
        self.check("describe_secret")?;
        self.lock()
            .secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::Secret, name))
    }

    async fn describe_run_service(
        &self,
        _project_id: &str,
        _region: &str,
        name: &str,
    ) -> CpResult<RunService> {
        self.check("describe_run_service")?;
        self.lock()
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::RunService, name))
    }

    async fn describe_scheduler_job(
        &self,
        _project_id: &str,
        _region: &str,
        name: &str,
    ) -> CpResult<SchedulerJob> {
        self.check("describe_scheduler_job")?;
        self.lock()
            .jobs
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::SchedulerJob, name))
    }

    async fn create_scheduler_job(
        &self,
        _project_id: &str,
        job: &SchedulerJob,
    ) -> CpResult<SchedulerJob> {
        self.check("create_scheduler_job")?;
        let mut state = self.lock();
        if state.jobs.contains_key(&job.name) {
            return Err(Self::already_exists("create_scheduler_job", &job.name));
        }
        state.jobs.insert(job.name.clone(), job.clone());
        self.record(&mut state, format!("create_scheduler_job {}", job.name));
        Ok(job.clone())
    }

    async fn update_scheduler_job(
        &self,
        _project_id: &str,
        job: &SchedulerJob,
        fields: &[SchedulerField],
    ) -> CpResult<SchedulerJob> {
        self.check("update_scheduler_job")?;
        let mut state = self.lock();
        let live = state
            .jobs
            .get_mut(&job.name)
            .ok_or_else(|| ControlPlaneError::not_found(ResourceKind::SchedulerJob, &job.name))?;
        for field in fields {
            match field {
                SchedulerField::HttpMethod => live.http_method = job.http_method.clone(),
                SchedulerField::Uri => live.uri = job.uri.clone(),
                SchedulerField::OidcServiceAccount => {
                    live.oidc_service_account = job.oidc_service_account.clone()
                }
                SchedulerField::OidcAudience => live.oidc_audience = job.oidc_audience.clone(),
                SchedulerField::Schedule => live.schedule = job.schedule.clone(),
                SchedulerField::TimeZone => live.time_zone = job.time_zone.clone(),
            }
        }
        let updated = live.clone();
        let mask = fields
            .iter()
            .map(SchedulerField::update_mask_path)
            .collect::<Vec<_>>()
            .join(",");
        self.record(&mut state, format!("update_scheduler_job {} {}", job.name, mask));
        Ok(updated)
    }

    async fn get_iam_policy(&self, scope: &Scope) -> CpResult<Policy> {
        self.check("get_iam_policy")?;
        let state = self.lock();
        if !self.scope_exists(&state, scope) {
            return Err(ControlPlaneError::not_found(
                scope.kind(),
                scope.resource_name(),
            ));
        }
        Ok(state.policies.get(scope).cloned().unwrap_or_default())
    }

    async fn add_binding(&self, scope: &Scope, role: &str, member: &str) -> CpResult<Policy> {
        self.check("add_binding")?;
        let mut state = self.lock();
        if !self.scope_exists(&state, scope) {
            return Err(ControlPlaneError::not_found(
                scope.kind(),
                scope.resource_name(),
            ));
        }
        let policy = state.policies.entry(scope.clone()).or_default();
        let changed = policy.grant(role, member);
        let policy = policy.clone();
        if changed {
            self.record(&mut state, format!("add_binding {} {} {}", scope, role, member));
        }
        Ok(policy)
    }

    async fn remove_binding(&self, scope: &Scope, role: &str, member: &str) -> CpResult<Policy> {
        self.check("remove_binding")?;
        let mut state = self.lock();
        if !self.scope_exists(&state, scope) {
            return Err(ControlPlaneError::not_found(
                scope.kind(),
                scope.resource_name(),
            ));
        }
        let policy = state.policies.entry(scope.clone()).or_default();
        let changed = policy.revoke(role, member);
        let policy = policy.clone();
        if changed {
            self.record(
                &mut state,
                format!("remove_binding {} {} {}", scope, role, member),
            );
        }
        Ok(policy)
    }
}
