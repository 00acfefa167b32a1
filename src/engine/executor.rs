use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

use super::condition;
use super::config::TrustConfig;
use super::confirm::Confirm;
use super::diff::{diff, Audit};
use super::error::EngineError;
use super::expectation::expected;
use super::plan::{Action, Plan, PlannedStep, ResourceRef};
use super::snapshot::{Snapshot, SnapshotLoader};
use crate::gcp::{
    ControlPlane, ControlPlaneError, CpResult, IdentityProvider, LifecycleState, ProviderSpec,
    ResourceKind,
};

/// What happens to later actions after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Skip only the actions depending on what failed
    #[default]
    Continue,
    StopOnFirstFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// Confirmation was not given. Not a failure.
    Declined,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step: PlannedStep,
    pub outcome: Outcome,
}

impl StepResult {
    pub fn is_applied(&self) -> bool {
        self.outcome == Outcome::Applied
    }
}

/// Applies a plan one action at a time
pub struct Executor<'a> {
    client: &'a dyn ControlPlane,
    config: &'a TrustConfig,
    confirm: &'a dyn Confirm,
    policy: FailurePolicy,
}

/// Errors meaning the desired state is already there
///
/// A 409 on `CreateProvider` is not listed: a deleted provider keeps its id
/// reserved, so the conflicting provider has to be inspected first.
fn already_converged(action: &Action, err: &ControlPlaneError) -> bool {
    match (action, err) {
        (
            Action::CreateServiceAccount { .. }
            | Action::CreatePool { .. }
            | Action::CreateSchedulerJob { .. },
            ControlPlaneError::Api { status: 409, .. },
        ) => true,
        (Action::DeleteProvider { .. } | Action::RemoveBinding(_), e) => e.is_not_found(),
        _ => false,
    }
}

/// Whether a live provider is active and configured as `spec` asks
fn provider_satisfies(provider: &IdentityProvider, spec: &ProviderSpec) -> bool {
    provider.state == LifecycleState::Active
        && !provider.disabled
        && provider.issuer_uri == spec.issuer_uri
        && provider.attribute_mapping == spec.attribute_mapping
        && condition::is_equivalent(
            provider.attribute_condition.as_deref(),
            &spec.attribute_condition,
        )
}

impl<'a> Executor<'a> {
    pub fn new(
        client: &'a dyn ControlPlane,
        config: &'a TrustConfig,
        confirm: &'a dyn Confirm,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            client,
            config,
            confirm,
            policy,
        }
    }

    async fn apply(&self, action: &Action) -> CpResult<()> {
        let client = self.client;
        match action {
            Action::CreateServiceAccount {
                project_id,
                account_id,
                display_name,
                ..
            } => {
                client
                    .create_service_account(project_id, account_id, display_name)
                    .await?;
            }
            Action::EnableServiceAccount { email, .. } => client.enable_service_account(email).await?,
            Action::CreatePool { project_id, spec } => {
                client.create_pool(project_id, spec).await?;
            }
            Action::UndeletePool {
                project_id,
                pool_id,
            } => client.undelete_pool(project_id, pool_id).await?,
            Action::EnablePool {
                project_id,
                pool_id,
            } => client.enable_pool(project_id, pool_id).await?,
            Action::UndeleteProvider {
                project_id,
                pool_id,
                provider_id,
            } => {
                client
                    .undelete_provider(project_id, pool_id, provider_id)
                    .await?
            }
            Action::DeleteProvider {
                project_id,
                pool_id,
                provider_id,
            } => client.delete_provider(project_id, pool_id, provider_id).await?,
            Action::CreateProvider { project_id, spec } => {
                client.create_provider(project_id, spec).await?;
            }
            Action::AddBinding(b) => {
                client.add_binding(&b.scope, &b.role, &b.member).await?;
            }
            Action::RemoveBinding(b) => {
                client.remove_binding(&b.scope, &b.role, &b.member).await?;
            }
            Action::CreateSchedulerJob { project_id, job } => {
                client.create_scheduler_job(project_id, job).await?;
            }
            Action::UpdateSchedulerJob {
                project_id,
                job,
                fields,
            } => {
                client.update_scheduler_job(project_id, job, fields).await?;
            }
        }
        Ok(())
    }

    /// Outcome of an action whose call returned an error
    async fn settle(&self, action: &Action, err: ControlPlaneError) -> Outcome {
        if let (
            Action::CreateProvider { project_id, spec },
            ControlPlaneError::Api { status: 409, .. },
        ) = (action, &err)
        {
            return match self
                .client
                .describe_provider(project_id, &spec.pool_id, &spec.provider_id)
                .await
            {
                Ok(existing) if provider_satisfies(&existing, spec) => {
                    info!("{} already converged: {}", action, err);
                    Outcome::Applied
                }
                Ok(existing) => Outcome::Failed(format!(
                    "provider id '{}' is held by a {} provider that does not match the declared configuration; \
                     a deleted provider keeps its id reserved, so undelete and correct it or declare a new provider id",
                    spec.provider_id, existing.state
                )),
                Err(describe_err) => Outcome::Failed(format!(
                    "{} (the conflicting provider could not be described: {})",
                    err, describe_err
                )),
            };
        }

        if already_converged(action, &err) {
            info!("{} already converged: {}", action, err);
            Outcome::Applied
        } else {
            Outcome::Failed(err.to_string())
        }
    }

    /// Run every step of `plan` in order
    ///
    /// Mutations are never issued concurrently. A declined, failed or skipped
    /// action blocks every later action requiring what it would have produced.
    pub async fn execute(&self, plan: &Plan) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(plan.len());
        let mut blocked: BTreeMap<ResourceRef, String> = BTreeMap::new();
        let mut stopped_by: Option<String> = None;

        for step in &plan.steps {
            let action = &step.action;
            let outcome = if let Some(failed) = &stopped_by {
                Outcome::Skipped(format!("stopped after {} failed", failed))
            } else if let Some((resource, reason)) = action
                .requires()
                .iter()
                .chain(action.produces().iter())
                .find_map(|r| blocked.get(r).map(|reason| (r.clone(), reason.clone())))
            {
                Outcome::Skipped(format!("{} {}", resource, reason))
            } else if action.is_destructive() && !self.confirm.confirm(step).await {
                Outcome::Declined
            } else {
                match self.apply(action).await {
                    Ok(()) => Outcome::Applied,
                    Err(e) => self.settle(action, e).await,
                }
            };

            let blocked_reason = match &outcome {
                Outcome::Applied => {
                    info!("Applied {}", action);
                    None
                }
                Outcome::Declined => {
                    let declined = EngineError::ConfirmationDeclined {
                        action: action.to_string(),
                    };
                    warn!("{}", declined);
                    Some(format!("was not changed ({} declined)", action.name()))
                }
                Outcome::Skipped(reason) => {
                    warn!("Skipped {}: {}", action, reason);
                    Some(format!("was not changed ({} skipped)", action.name()))
                }
                Outcome::Failed(message) => {
                    error!("Failed {}: {}", action, message);
                    if self.policy == FailurePolicy::StopOnFirstFailure {
                        stopped_by = Some(action.to_string());
                    }
                    Some(format!("failed ({} failed)", action.name()))
                }
            };
            if let Some(reason) = blocked_reason {
                for r in action.produces() {
                    blocked.entry(r).or_insert_with(|| reason.clone());
                }
            }

            results.push(StepResult {
                step: step.clone(),
                outcome,
            });
        }
        results
    }

    /// Re-fetch what the applied actions touched and re-diff
    ///
    /// Returns the post-run audit and one error per targeted finding that still
    /// reproduces.
    pub async fn verify(
        &self,
        loader: &SnapshotLoader<'_>,
        snapshot: &mut Snapshot,
        project_number: u64,
        results: &[StepResult],
    ) -> (Audit, Vec<EngineError>) {
        let kinds: BTreeSet<ResourceKind> = results
            .iter()
            .filter(|r| r.is_applied())
            .map(|r| r.step.action.affected_kind())
            .collect();
        if !kinds.is_empty() {
            loader.refresh(snapshot, &kinds).await;
        }

        let project_number = snapshot.project_number().unwrap_or(project_number);
        let expectation = expected(self.config, project_number);
        let audit = diff(self.config, &expectation, snapshot);

        let mut failures = vec![];
        for result in results.iter().filter(|r| r.is_applied()) {
            for finding in &result.step.addresses {
                if audit.findings.contains(finding) {
                    let failure = EngineError::RemediationVerificationFailed {
                        action: result.step.action.to_string(),
                        finding: finding.to_string(),
                        command: result.step.action.command(),
                    };
                    error!("{}", failure);
                    failures.push(failure);
                }
            }
        }
        (audit, failures)
    }
}
