use serde::Serialize;
use tracing::debug;

use super::condition;
use super::config::TrustConfig;
use super::diff::Unverifiable;
use super::error::EngineError;
use super::principal::PrincipalSet;
use super::snapshot::{Fetched, Snapshot};
use crate::gcp::{ControlPlane, ControlPlaneError, LifecycleState, ResourceKind, Scope};

/// A binding whose member is exactly the stale principal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleBinding {
    pub scope: Scope,
    pub role: String,
    pub member: String,
    pub command: String,
}

/// Whether a provider of the pool still federates the stale repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAdmission {
    pub provider_id: String,
    pub condition: Option<String>,
    /// `None` when the condition is not of a shape that can be evaluated
    pub admits: Option<bool>,
}

/// Decommission diagnostic for one repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupReport {
    pub repository: String,
    pub principal: String,
    pub bindings: Vec<StaleBinding>,
    pub providers: Vec<ProviderAdmission>,
    pub unverifiable: Vec<Unverifiable>,
}

impl CleanupReport {
    /// Nothing references the repository any more
    pub fn is_clean(&self) -> bool {
        self.bindings.is_empty()
            && self.unverifiable.is_empty()
            && self.providers.iter().all(|p| p.admits == Some(false))
    }
}

/// Find every reference to `repository` left in the live state
///
/// Read-only. Members are compared to the computed principal for equality, so
/// `org/repo` never matches `org/repo-staging`.
pub async fn stale_references(
    client: &dyn ControlPlane,
    config: &TrustConfig,
    snapshot: &Snapshot,
    project_number: u64,
    repository: &str,
) -> Result<CleanupReport, EngineError> {
    if config.federation.repositories.iter().any(|r| r == repository) {
        return Err(EngineError::RepositoryStillDeclared {
            repository: repository.to_string(),
        });
    }

    let principal =
        PrincipalSet::for_repository(project_number, &config.federation.pool_id, repository)
            .to_string();
    debug!(%principal, "Searching for stale principal");

    let mut report = CleanupReport {
        repository: repository.to_string(),
        principal: principal.clone(),
        bindings: vec![],
        providers: vec![],
        unverifiable: vec![],
    };

    for (scope, policy) in snapshot.policies(config) {
        match policy {
            Fetched::Present(policy) => {
                for (role, member) in policy.pairs() {
                    if member == principal {
                        report.bindings.push(StaleBinding {
                            command: scope.gcloud_binding_command("remove", role, member),
                            scope: scope.clone(),
                            role: role.to_string(),
                            member: member.to_string(),
                        });
                    }
                }
            }
            Fetched::NotFound => {}
            Fetched::Unreachable(e) => report.unverifiable.push(Unverifiable {
                kind: scope.kind(),
                name: scope.resource_name().to_string(),
                error: e.clone(),
            }),
        }
    }

    match client
        .list_providers(&config.project_id, &config.federation.pool_id)
        .await
    {
        Ok(providers) => {
            // A deleted provider federates nothing
            for provider in providers
                .into_iter()
                .filter(|p| p.state != LifecycleState::Deleted)
            {
                let condition = provider.attribute_condition.clone();
                report.providers.push(ProviderAdmission {
                    admits: condition::admits(condition.as_deref(), repository),
                    provider_id: provider.provider_id,
                    condition,
                });
            }
        }
        Err(ControlPlaneError::NotFound { .. }) => {}
        Err(e) => report.unverifiable.push(Unverifiable {
            kind: ResourceKind::IdentityProvider,
            name: config.federation.pool_id.clone(),
            error: e.to_string(),
        }),
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config;
    use crate::engine::expectation::ROLE_WORKLOAD_IDENTITY_USER;
    use crate::engine::snapshot::SnapshotLoader;
    use crate::gcp::fake::FakeControlPlane;
    use crate::gcp::IdentityProvider;

    const STAGING: &str = "hordia/trust-engine-v2-staging";

    async fn report_for(fake: &FakeControlPlane, config: &TrustConfig, repo: &str) -> CleanupReport {
        let snapshot = SnapshotLoader::new(fake, config).load().await;
        stale_references(fake, config, &snapshot, 123456, repo)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_exact_principal_match_only() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let sa_scope = Scope::ServiceAccount {
            project_id: config.project_id.clone(),
            email: config.service_account_email(),
        };
        let stale = PrincipalSet::for_repository(123456, "github-pool", "hordia/trust-engine").to_string();
        fake.add_binding(&sa_scope, ROLE_WORKLOAD_IDENTITY_USER, &stale)
            .await
            .unwrap();

        // The declared repository starts with the stale name but must not match
        let report = report_for(&fake, &config, "hordia/trust-engine").await;
        assert_eq!(report.bindings.len(), 1);
        assert_eq!(report.bindings[0].member, stale);
        assert!(report.bindings[0]
            .command
            .starts_with("gcloud iam service-accounts remove-iam-policy-binding github-deployer@hordia-prod.iam.gserviceaccount.com"));
        assert_eq!(report.providers[0].admits, Some(false));
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_clean_after_decommission() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let report = report_for(&fake, &config, STAGING).await;
        assert!(report.bindings.is_empty());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_other_provider_still_admits() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.insert_provider(IdentityProvider {
            pool_id: "github-pool".to_string(),
            provider_id: "legacy".to_string(),
            name: "projects/123456/locations/global/workloadIdentityPools/github-pool/providers/legacy".to_string(),
            issuer_uri: config::GITHUB_ISSUER_URI.to_string(),
            attribute_mapping: config::default_attribute_mapping(),
            attribute_condition: Some(format!("attribute.repository=='{}'", STAGING)),
            state: LifecycleState::Active,
            disabled: false,
        });

        let report = report_for(&fake, &config, STAGING).await;
        let legacy = report
            .providers
            .iter()
            .find(|p| p.provider_id == "legacy")
            .unwrap();
        assert_eq!(legacy.admits, Some(true));
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_deleted_provider_is_ignored() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        fake.insert_provider(IdentityProvider {
            pool_id: "github-pool".to_string(),
            provider_id: "retired".to_string(),
            name: "projects/123456/locations/global/workloadIdentityPools/github-pool/providers/retired".to_string(),
            issuer_uri: config::GITHUB_ISSUER_URI.to_string(),
            attribute_mapping: config::default_attribute_mapping(),
            attribute_condition: None,
            state: LifecycleState::Deleted,
            disabled: false,
        });

        let report = report_for(&fake, &config, STAGING).await;
        assert!(report.providers.iter().all(|p| p.provider_id != "retired"));
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_declared_repository_is_refused() {
        let config = config::sample();
        let fake = FakeControlPlane::matching(&config, 123456);
        let snapshot = SnapshotLoader::new(&fake, &config).load().await;
        let err = stale_references(&fake, &config, &snapshot, 123456, "hordia/trust-engine-v2")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RepositoryStillDeclared { .. }));
    }
}
