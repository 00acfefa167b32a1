pub mod models;
pub mod rest;

#[cfg(test)]
pub mod fake;

pub use models::*;
pub use rest::GcpClient;

use async_trait::async_trait;

/// Errors returned by the control plane
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlPlaneError {
    /// The resource does not exist. This is an expected state and drives create actions.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },
    /// Transport or authentication failure
    #[error("control plane unreachable during {operation}: {message}")]
    Unreachable { operation: String, message: String },
    /// The API answered but rejected the request
    #[error("{operation} failed (status {status}): {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },
}

impl ControlPlaneError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlPlaneError::NotFound { .. })
    }
}

pub type CpResult<T> = Result<T, ControlPlaneError>;

/// Operations the engine requires from the cloud control plane
///
/// Every call carries the client's own timeout. Implementations must not retry:
/// a failed call is terminal for the action that issued it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn describe_project(&self, project_id: &str) -> CpResult<ProjectInfo>;

    async fn describe_service_account(&self, email: &str) -> CpResult<ServiceAccount>;

    async fn create_service_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> CpResult<ServiceAccount>;

    async fn enable_service_account(&self, email: &str) -> CpResult<()>;

    async fn describe_pool(&self, project_id: &str, pool_id: &str) -> CpResult<IdentityPool>;

    async fn create_pool(&self, project_id: &str, spec: &PoolSpec) -> CpResult<IdentityPool>;

    /// Clear the `disabled` flag on a pool
    async fn enable_pool(&self, project_id: &str, pool_id: &str) -> CpResult<()>;

    async fn undelete_pool(&self, project_id: &str, pool_id: &str) -> CpResult<()>;

    async fn describe_provider(
        &self,
        project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<IdentityProvider>;

    async fn list_providers(
        &self,
        project_id: &str,
        pool_id: &str,
    ) -> CpResult<Vec<IdentityProvider>>;

    async fn create_provider(
        &self,
        project_id: &str,
        spec: &ProviderSpec,
    ) -> CpResult<IdentityProvider>;

    async fn delete_provider(
        &self,
        project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<()>;

    async fn undelete_provider(
        &self,
        project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<()>;

    async fn describe_secret(&self, project_id: &str, name: &str) -> CpResult<Secret>;

    async fn describe_run_service(
        &self,
        project_id: &str,
        region: &str,
        name: &str,
    ) -> CpResult<RunService>;

    async fn describe_scheduler_job(
        &self,
        project_id: &str,
        region: &str,
        name: &str,
    ) -> CpResult<SchedulerJob>;

    async fn create_scheduler_job(
        &self,
        project_id: &str,
        job: &SchedulerJob,
    ) -> CpResult<SchedulerJob>;

    /// Patch only `fields` of the job to the values carried by `job`
    async fn update_scheduler_job(
        &self,
        project_id: &str,
        job: &SchedulerJob,
        fields: &[SchedulerField],
    ) -> CpResult<SchedulerJob>;

    async fn get_iam_policy(&self, scope: &Scope) -> CpResult<Policy>;

    /// Add `member` to `role` on `scope`, leaving every other binding untouched
    async fn add_binding(&self, scope: &Scope, role: &str, member: &str) -> CpResult<Policy>;

    /// Remove `member` from `role` on `scope`, leaving every other binding untouched
    async fn remove_binding(&self, scope: &Scope, role: &str, member: &str)
        -> CpResult<Policy>;
}
