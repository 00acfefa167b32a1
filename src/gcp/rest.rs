use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{
    ControlPlane, ControlPlaneError, CpResult, IdentityPool, IdentityProvider, LifecycleState,
    Policy, PoolSpec, ProjectInfo, ProviderSpec, ResourceKind, RunService, SchedulerField,
    SchedulerJob, Scope, Secret, ServiceAccount,
};
use crate::settings::GcpSettings;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectWire {
    project_id: String,
    project_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountWire {
    email: String,
    #[serde(default)]
    unique_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolWire {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    state: LifecycleState,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct OidcWire {
    issuer_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderWire {
    name: String,
    #[serde(default)]
    attribute_mapping: BTreeMap<String, String>,
    #[serde(default)]
    attribute_condition: Option<String>,
    #[serde(default)]
    oidc: Option<OidcWire>,
    #[serde(default)]
    state: LifecycleState,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProvidersWire {
    #[serde(default)]
    workload_identity_pool_providers: Vec<ProviderWire>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Long-running operation returned by the IAM mutations
#[derive(Debug, Deserialize)]
struct OperationWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<StatusWire>,
}

#[derive(Debug, Deserialize)]
struct StatusWire {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SecretWire {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RunServiceWire {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct OidcTokenWire {
    #[serde(default)]
    service_account_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audience: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct HttpTargetWire {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    http_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    oidc_token: Option<OidcTokenWire>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobWire {
    name: String,
    #[serde(default)]
    schedule: String,
    #[serde(default)]
    time_zone: String,
    #[serde(default)]
    http_target: Option<HttpTargetWire>,
}

/// Last path segment of a resource name
fn short_name(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}

/// Extract the numeric project from `projects/{number}/...`
fn project_number_from_name(resource_name: &str) -> Option<u64> {
    resource_name
        .strip_prefix("projects/")?
        .split('/')
        .next()?
        .parse()
        .ok()
}

impl PoolWire {
    fn into_model(self) -> IdentityPool {
        IdentityPool {
            pool_id: short_name(&self.name).to_string(),
            project_number: project_number_from_name(&self.name).unwrap_or_default(),
            name: self.name,
            display_name: self.display_name,
            state: self.state,
            disabled: self.disabled,
        }
    }
}

impl ProviderWire {
    fn into_model(self) -> IdentityProvider {
        let pool_id = self
            .name
            .split('/')
            .skip_while(|s| *s != "workloadIdentityPools")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        IdentityProvider {
            pool_id,
            provider_id: short_name(&self.name).to_string(),
            issuer_uri: self.oidc.map(|o| o.issuer_uri).unwrap_or_default(),
            attribute_mapping: self.attribute_mapping,
            attribute_condition: self.attribute_condition.filter(|c| !c.trim().is_empty()),
            state: self.state,
            disabled: self.disabled,
            name: self.name,
        }
    }
}

impl JobWire {
    fn into_model(self, region: &str) -> SchedulerJob {
        let target = self.http_target.unwrap_or_default();
        let (oidc_service_account, oidc_audience) = match target.oidc_token {
            Some(token) => (
                Some(token.service_account_email).filter(|s| !s.is_empty()),
                token.audience.filter(|s| !s.is_empty()),
            ),
            None => (None, None),
        };
        SchedulerJob {
            name: short_name(&self.name).to_string(),
            region: region.to_string(),
            http_method: target.http_method,
            uri: target.uri,
            oidc_service_account,
            oidc_audience,
            schedule: self.schedule,
            time_zone: self.time_zone,
        }
    }

    fn from_model(project_id: &str, job: &SchedulerJob) -> Self {
        Self {
            name: format!(
                "projects/{}/locations/{}/jobs/{}",
                project_id, job.region, job.name
            ),
            schedule: job.schedule.clone(),
            time_zone: job.time_zone.clone(),
            http_target: Some(HttpTargetWire {
                uri: job.uri.clone(),
                http_method: job.http_method.to_uppercase(),
                oidc_token: job.oidc_service_account.as_ref().map(|sa| OidcTokenWire {
                    service_account_email: sa.clone(),
                    audience: job.oidc_audience.clone(),
                }),
            }),
        }
    }
}

/// HTTP status equivalent of a google.rpc.Code
fn rpc_code_to_status(code: i32) -> u16 {
    match code {
        3 | 9 | 11 => 400,
        5 => 404,
        6 | 10 => 409,
        7 => 403,
        8 => 429,
        16 => 401,
        _ => 500,
    }
}

impl OperationWire {
    /// `None` while the operation is still running
    fn outcome(&self, operation: &str, kind: ResourceKind, name: &str) -> Option<CpResult<()>> {
        if !self.done {
            return None;
        }
        Some(match &self.error {
            None => Ok(()),
            Some(status) => Err(match rpc_code_to_status(status.code) {
                404 => ControlPlaneError::not_found(kind, name),
                code => ControlPlaneError::Api {
                    operation: operation.to_string(),
                    status: code,
                    message: status.message.clone(),
                },
            }),
        })
    }
}

/// Resolve a bearer token for the Google APIs
///
/// Order: explicit setting, `GOOGLE_OAUTH_ACCESS_TOKEN`, then `gcloud auth print-access-token`.
async fn resolve_access_token(settings: &GcpSettings) -> Result<String> {
    if let Some(token) = settings.access_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        if !token.is_empty() {
            return Ok(token);
        }
    }

    debug!("Requesting access token from gcloud");
    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .context("Failed to run 'gcloud auth print-access-token'. Is the Google Cloud SDK installed?")?;

    if !output.status.success() {
        anyhow::bail!(
            "'gcloud auth print-access-token' failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let token = String::from_utf8(output.stdout)
        .context("gcloud returned a non UTF-8 access token")?
        .trim()
        .to_string();
    if token.is_empty() {
        anyhow::bail!("gcloud returned an empty access token. Run 'gcloud auth login' first.");
    }
    Ok(token)
}

const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// REST implementation of the control plane against the Google Cloud APIs
pub struct GcpClient {
    http: Client,
    token: String,
    settings: GcpSettings,
}

impl GcpClient {
    pub async fn new(settings: GcpSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let token = resolve_access_token(&settings).await?;
        Ok(Self {
            http,
            token,
            settings,
        })
    }

    fn iam(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.iam_endpoint, path)
    }

    fn resource_manager(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.resource_manager_endpoint, path)
    }

    fn secret_manager(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.secret_manager_endpoint, path)
    }

    fn run(&self, path: &str) -> String {
        format!("{}/v2/{}", self.settings.run_endpoint, path)
    }

    fn scheduler(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.scheduler_endpoint, path)
    }

    fn pool_path(project_id: &str, pool_id: &str) -> String {
        format!(
            "projects/{}/locations/global/workloadIdentityPools/{}",
            project_id, pool_id
        )
    }

    fn service_account_path(project_id: &str, email: &str) -> String {
        format!(
            "projects/{}/serviceAccounts/{}",
            project_id,
            urlencoding::encode(email)
        )
    }

    /// Send a request and decode the JSON body, mapping failures onto the error taxonomy
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        kind: ResourceKind,
        name: &str,
        request: RequestBuilder,
    ) -> CpResult<T> {
        debug!(operation, name, "Calling control plane");
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Unreachable {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ControlPlaneError::Api {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                    message: format!("Failed to parse response: {}", e),
                });
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(match status.as_u16() {
            404 => ControlPlaneError::not_found(kind, name),
            401 | 403 => ControlPlaneError::Unreachable {
                operation: operation.to_string(),
                message: format!("permission denied (status {}): {}", status, message),
            },
            code => ControlPlaneError::Api {
                operation: operation.to_string(),
                status: code,
                message,
            },
        })
    }

    /// Poll a long-running IAM operation until it is done
    ///
    /// Bounded by `gcp.operation_timeout_secs`; running out of time is reported
    /// as unreachable so the action fails instead of hanging.
    async fn wait_for(
        &self,
        operation: &str,
        kind: ResourceKind,
        name: &str,
        mut op: OperationWire,
    ) -> CpResult<()> {
        let deadline = Duration::from_secs(self.settings.operation_timeout_secs);
        let poll = async {
            loop {
                if let Some(outcome) = op.outcome(operation, kind, name) {
                    return outcome;
                }
                if op.name.is_empty() {
                    // Nothing to poll; the mutation was accepted
                    return Ok(());
                }
                tokio::time::sleep(OPERATION_POLL_INTERVAL).await;
                debug!(operation, name = op.name.as_str(), "Polling operation");
                op = self
                    .send(operation, kind, name, self.http.get(self.iam(&op.name)))
                    .await?;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| ControlPlaneError::Unreachable {
                operation: operation.to_string(),
                message: format!(
                    "operation did not finish within {}s",
                    self.settings.operation_timeout_secs
                ),
            })?
    }

    /// Request that reads the IAM policy of a scope
    fn get_policy_request(&self, scope: &Scope) -> RequestBuilder {
        let options = json!({ "options": { "requestedPolicyVersion": 3 } });
        match scope {
            Scope::Project { project_id } => self
                .http
                .post(self.resource_manager(&format!("projects/{}:getIamPolicy", project_id)))
                .json(&options),
            Scope::ServiceAccount { project_id, email } => self
                .http
                .post(self.iam(&format!(
                    "{}:getIamPolicy",
                    Self::service_account_path(project_id, email)
                )))
                .json(&options),
            Scope::Secret { project_id, name } => self
                .http
                .get(self.secret_manager(&format!(
                    "projects/{}/secrets/{}:getIamPolicy",
                    project_id, name
                )))
                .query(&[("options.requestedPolicyVersion", "3")]),
            Scope::RunService {
                project_id,
                region,
                name,
            } => self
                .http
                .get(self.run(&format!(
                    "projects/{}/locations/{}/services/{}:getIamPolicy",
                    project_id, region, name
                )))
                .query(&[("options.requestedPolicyVersion", "3")]),
        }
    }

    fn set_policy_url(&self, scope: &Scope) -> String {
        match scope {
            Scope::Project { project_id } => {
                self.resource_manager(&format!("projects/{}:setIamPolicy", project_id))
            }
            Scope::ServiceAccount { project_id, email } => self.iam(&format!(
                "{}:setIamPolicy",
                Self::service_account_path(project_id, email)
            )),
            Scope::Secret { project_id, name } => self.secret_manager(&format!(
                "projects/{}/secrets/{}:setIamPolicy",
                project_id, name
            )),
            Scope::RunService {
                project_id,
                region,
                name,
            } => self.run(&format!(
                "projects/{}/locations/{}/services/{}:setIamPolicy",
                project_id, region, name
            )),
        }
    }

    /// Read-modify-write of a policy, guarded by the etag the read returned
    async fn modify_policy(
        &self,
        scope: &Scope,
        modify: impl FnOnce(&mut Policy) -> bool,
    ) -> CpResult<Policy> {
        let mut policy = self.get_iam_policy(scope).await?;
        if !modify(&mut policy) {
            return Ok(policy);
        }
        self.send(
            "setIamPolicy",
            scope.kind(),
            scope.resource_name(),
            self.http
                .post(self.set_policy_url(scope))
                .json(&json!({ "policy": policy })),
        )
        .await
    }
}

#[async_trait]
impl ControlPlane for GcpClient {
    async fn describe_project(&self, project_id: &str) -> CpResult<ProjectInfo> {
        let wire: ProjectWire = self
            .send(
                "projects.get",
                ResourceKind::Project,
                project_id,
                self.http
                    .get(self.resource_manager(&format!("projects/{}", project_id))),
            )
            .await?;
        let project_number = wire.project_number.parse().map_err(|_| ControlPlaneError::Api {
            operation: "projects.get".to_string(),
            status: 200,
            message: format!("invalid project number '{}'", wire.project_number),
        })?;
        Ok(ProjectInfo {
            project_id: wire.project_id,
            project_number,
        })
    }

    async fn describe_service_account(&self, email: &str) -> CpResult<ServiceAccount> {
        let wire: ServiceAccountWire = self
            .send(
                "serviceAccounts.get",
                ResourceKind::ServiceAccount,
                email,
                self.http.get(self.iam(&Self::service_account_path("-", email))),
            )
            .await?;
        Ok(ServiceAccount {
            email: wire.email,
            unique_id: wire.unique_id,
            display_name: wire.display_name,
            disabled: wire.disabled,
        })
    }

    async fn create_service_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> CpResult<ServiceAccount> {
        let wire: ServiceAccountWire = self
            .send(
                "serviceAccounts.create",
                ResourceKind::ServiceAccount,
                account_id,
                self.http
                    .post(self.iam(&format!("projects/{}/serviceAccounts", project_id)))
                    .json(&json!({
                        "accountId": account_id,
                        "serviceAccount": { "displayName": display_name },
                    })),
            )
            .await?;
        Ok(ServiceAccount {
            email: wire.email,
            unique_id: wire.unique_id,
            display_name: wire.display_name,
            disabled: wire.disabled,
        })
    }

    async fn enable_service_account(&self, email: &str) -> CpResult<()> {
        let _: serde_json::Value = self
            .send(
                "serviceAccounts.enable",
                ResourceKind::ServiceAccount,
                email,
                self.http
                    .post(self.iam(&format!(
                        "{}:enable",
                        Self::service_account_path("-", email)
                    )))
                    .json(&json!({})),
            )
            .await?;
        Ok(())
    }

    async fn describe_pool(&self, project_id: &str, pool_id: &str) -> CpResult<IdentityPool> {
        let wire: PoolWire = self
            .send(
                "workloadIdentityPools.get",
                ResourceKind::IdentityPool,
                pool_id,
                self.http.get(self.iam(&Self::pool_path(project_id, pool_id))),
            )
            .await?;
        Ok(wire.into_model())
    }

    async fn create_pool(&self, project_id: &str, spec: &PoolSpec) -> CpResult<IdentityPool> {
        let operation: OperationWire = self
            .send(
                "workloadIdentityPools.create",
                ResourceKind::IdentityPool,
                &spec.pool_id,
                self.http
                    .post(self.iam(&format!(
                        "projects/{}/locations/global/workloadIdentityPools",
                        project_id
                    )))
                    .query(&[("workloadIdentityPoolId", spec.pool_id.as_str())])
                    .json(&json!({
                        "displayName": spec.display_name,
                        "disabled": false,
                    })),
            )
            .await?;
        self.wait_for(
            "workloadIdentityPools.create",
            ResourceKind::IdentityPool,
            &spec.pool_id,
            operation,
        )
        .await?;
        self.describe_pool(project_id, &spec.pool_id).await
    }

    async fn enable_pool(&self, project_id: &str, pool_id: &str) -> CpResult<()> {
        let operation: OperationWire = self
            .send(
                "workloadIdentityPools.patch",
                ResourceKind::IdentityPool,
                pool_id,
                self.http
                    .patch(self.iam(&Self::pool_path(project_id, pool_id)))
                    .query(&[("updateMask", "disabled")])
                    .json(&json!({ "disabled": false })),
            )
            .await?;
        self.wait_for(
            "workloadIdentityPools.patch",
            ResourceKind::IdentityPool,
            pool_id,
            operation,
        )
        .await?;
        Ok(())
    }

    async fn undelete_pool(&self, project_id: &str, pool_id: &str) -> CpResult<()> {
        let operation: OperationWire = self
            .send(
                "workloadIdentityPools.undelete",
                ResourceKind::IdentityPool,
                pool_id,
                self.http
                    .post(self.iam(&format!(
                        "{}:undelete",
                        Self::pool_path(project_id, pool_id)
                    )))
                    .json(&json!({})),
            )
            .await?;
        self.wait_for(
            "workloadIdentityPools.undelete",
            ResourceKind::IdentityPool,
            pool_id,
            operation,
        )
        .await?;
        Ok(())
    }

    async fn describe_provider(
        &self,
        project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<IdentityProvider> {
        let wire: ProviderWire = self
            .send(
                "workloadIdentityPools.providers.get",
                ResourceKind::IdentityProvider,
                provider_id,
                self.http.get(self.iam(&format!(
                    "{}/providers/{}",
                    Self::pool_path(project_id, pool_id),
                    provider_id
                ))),
            )
            .await?;
        Ok(wire.into_model())
    }

    async fn list_providers(
        &self,
        project_id: &str,
        pool_id: &str,
    ) -> CpResult<Vec<IdentityProvider>> {
        let mut providers = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(self.iam(&format!(
                    "{}/providers",
                    Self::pool_path(project_id, pool_id)
                )))
                .query(&[("showDeleted", "true")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListProvidersWire = self
                .send(
                    "workloadIdentityPools.providers.list",
                    ResourceKind::IdentityPool,
                    pool_id,
                    request,
                )
                .await?;
            providers.extend(
                page.workload_identity_pool_providers
                    .into_iter()
                    .map(ProviderWire::into_model),
            );
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(providers)
    }

    async fn create_provider(
        &self,
        project_id: &str,
        spec: &ProviderSpec,
    ) -> CpResult<IdentityProvider> {
        let operation: OperationWire = self
            .send(
                "workloadIdentityPools.providers.create",
                ResourceKind::IdentityProvider,
                &spec.provider_id,
                self.http
                    .post(self.iam(&format!(
                        "{}/providers",
                        Self::pool_path(project_id, &spec.pool_id)
                    )))
                    .query(&[("workloadIdentityPoolProviderId", spec.provider_id.as_str())])
                    .json(&json!({
                        "attributeMapping": spec.attribute_mapping,
                        "attributeCondition": spec.attribute_condition,
                        "oidc": OidcWire { issuer_uri: spec.issuer_uri.clone() },
                    })),
            )
            .await?;
        self.wait_for(
            "workloadIdentityPools.providers.create",
            ResourceKind::IdentityProvider,
            &spec.provider_id,
            operation,
        )
        .await?;
        self.describe_provider(project_id, &spec.pool_id, &spec.provider_id)
            .await
    }

    async fn delete_provider(
        &self,
        project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<()> {
        let operation: OperationWire = self
            .send(
                "workloadIdentityPools.providers.delete",
                ResourceKind::IdentityProvider,
                provider_id,
                self.http.delete(self.iam(&format!(
                    "{}/providers/{}",
                    Self::pool_path(project_id, pool_id),
                    provider_id
                ))),
            )
            .await?;
        self.wait_for(
            "workloadIdentityPools.providers.delete",
            ResourceKind::IdentityProvider,
            provider_id,
            operation,
        )
        .await?;
        Ok(())
    }

    async fn undelete_provider(
        &self,
        project_id: &str,
        pool_id: &str,
        provider_id: &str,
    ) -> CpResult<()> {
        let operation: OperationWire = self
            .send(
                "workloadIdentityPools.providers.undelete",
                ResourceKind::IdentityProvider,
                provider_id,
                self.http
                    .post(self.iam(&format!(
                        "{}/providers/{}:undelete",
                        Self::pool_path(project_id, pool_id),
                        provider_id
                    )))
                    .json(&json!({})),
            )
            .await?;
        self.wait_for(
            "workloadIdentityPools.providers.undelete",
            ResourceKind::IdentityProvider,
            provider_id,
            operation,
        )
        .await?;
        Ok(())
    }

    async fn describe_secret(&self, project_id: &str, name: &str) -> CpResult<Secret> {
        let wire: SecretWire = self
            .send(
                "secrets.get",
                ResourceKind::Secret,
                name,
                self.http
                    .get(self.secret_manager(&format!("projects/{}/secrets/{}", project_id, name))),
            )
            .await?;
        Ok(Secret {
            name: short_name(&wire.name).to_string(),
            resource_name: wire.name,
        })
    }

    async fn describe_run_service(
        &self,
        project_id: &str,
        region: &str,
        name: &str,
    ) -> CpResult<RunService> {
        let wire: RunServiceWire = self
            .send(
                "services.get",
                ResourceKind::RunService,
                name,
                self.http.get(self.run(&format!(
                    "projects/{}/locations/{}/services/{}",
                    project_id, region, name
                ))),
            )
            .await?;
        Ok(RunService {
            name: name.to_string(),
            region: region.to_string(),
            uri: wire.uri.filter(|u| !u.is_empty()),
        })
    }

    async fn describe_scheduler_job(
        &self,
        project_id: &str,
        region: &str,
        name: &str,
    ) -> CpResult<SchedulerJob> {
        let wire: JobWire = self
            .send(
                "jobs.get",
                ResourceKind::SchedulerJob,
                name,
                self.http.get(self.scheduler(&format!(
                    "projects/{}/locations/{}/jobs/{}",
                    project_id, region, name
                ))),
            )
            .await?;
        Ok(wire.into_model(region))
    }

    async fn create_scheduler_job(
        &self,
        project_id: &str,
        job: &SchedulerJob,
    ) -> CpResult<SchedulerJob> {
        let wire: JobWire = self
            .send(
                "jobs.create",
                ResourceKind::SchedulerJob,
                &job.name,
                self.http
                    .post(self.scheduler(&format!(
                        "projects/{}/locations/{}/jobs",
                        project_id, job.region
                    )))
                    .json(&JobWire::from_model(project_id, job)),
            )
            .await?;
        Ok(wire.into_model(&job.region))
    }

    async fn update_scheduler_job(
        &self,
        project_id: &str,
        job: &SchedulerJob,
        fields: &[SchedulerField],
    ) -> CpResult<SchedulerJob> {
        let mask = fields
            .iter()
            .map(|f| f.update_mask_path())
            .collect::<Vec<_>>()
            .join(",");
        let wire: JobWire = self
            .send(
                "jobs.patch",
                ResourceKind::SchedulerJob,
                &job.name,
                self.http
                    .patch(self.scheduler(&format!(
                        "projects/{}/locations/{}/jobs/{}",
                        project_id, job.region, job.name
                    )))
                    .query(&[("updateMask", mask.as_str())])
                    .json(&JobWire::from_model(project_id, job)),
            )
            .await?;
        Ok(wire.into_model(&job.region))
    }

    async fn get_iam_policy(&self, scope: &Scope) -> CpResult<Policy> {
        self.send(
            "getIamPolicy",
            scope.kind(),
            scope.resource_name(),
            self.get_policy_request(scope),
        )
        .await
    }

    async fn add_binding(&self, scope: &Scope, role: &str, member: &str) -> CpResult<Policy> {
        self.modify_policy(scope, |policy| policy.grant(role, member))
            .await
    }

    async fn remove_binding(
        &self,
        scope: &Scope,
        role: &str,
        member: &str,
    ) -> CpResult<Policy> {
        self.modify_policy(scope, |policy| policy.revoke(role, member))
            .await
    }
}
