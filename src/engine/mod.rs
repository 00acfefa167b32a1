pub mod cleanup;
pub mod condition;
pub mod config;
pub mod confirm;
pub mod diff;
pub mod error;
pub mod executor;
pub mod expectation;
pub mod plan;
pub mod principal;
pub mod report;
pub mod scheduler;
pub mod snapshot;

use std::sync::Arc;
use tracing::{debug, info};

use crate::gcp::ControlPlane;
use cleanup::CleanupReport;
use config::TrustConfig;
use confirm::Confirm;
use diff::{diff, Audit};
use error::EngineError;
use executor::{Executor, FailurePolicy, StepResult};
use expectation::{expected, Expectation};
use plan::{FixScope, Plan};
use report::Report;
use scheduler::SchedulerDiagnosis;
use snapshot::{Fetched, Snapshot, SnapshotLoader};

/// Snapshot, expectation and their diff for one point in time
pub struct Observation {
    pub snapshot: Snapshot,
    pub expectation: Expectation,
    pub audit: Audit,
}

impl Observation {
    pub fn project_number(&self) -> u64 {
        self.expectation.project_number
    }
}

/// Everything a fix run did
pub struct FixOutcome {
    pub project_number: u64,
    pub before: Audit,
    pub plan: Plan,
    /// Empty for a dry run
    pub results: Vec<StepResult>,
    pub after: Audit,
    pub verification_failures: Vec<EngineError>,
    pub dry_run: bool,
}

/// Audit and repair engine for one declared trust configuration
pub struct Engine {
    client: Arc<dyn ControlPlane>,
    config: TrustConfig,
    failure_policy: FailurePolicy,
}

impl Engine {
    pub fn new(client: Arc<dyn ControlPlane>, config: TrustConfig, failure_policy: FailurePolicy) -> Self {
        Self {
            client,
            config,
            failure_policy,
        }
    }

    fn loader(&self) -> SnapshotLoader<'_> {
        SnapshotLoader::new(self.client.as_ref(), &self.config)
    }

    /// Load the live state and compare it to the declared configuration
    pub async fn observe(&self) -> Result<Observation, EngineError> {
        let snapshot = self.loader().load().await;
        let project_number = snapshot.project_number().ok_or_else(|| {
            let reason = match (&snapshot.pool, &snapshot.project) {
                (_, Fetched::Unreachable(e)) => e.clone(),
                (Fetched::Unreachable(e), _) => e.clone(),
                _ => "neither the pool nor the project could be described".to_string(),
            };
            EngineError::ProjectNumberUnresolved {
                project_id: self.config.project_id.clone(),
                reason,
            }
        })?;
        debug!(project_number, "Resolved project number");

        let expectation = expected(&self.config, project_number);
        let audit = diff(&self.config, &expectation, &snapshot);
        Ok(Observation {
            snapshot,
            expectation,
            audit,
        })
    }

    /// Audit only
    pub async fn verify(&self) -> Result<Report, EngineError> {
        let observation = self.observe().await?;
        let plan = plan::plan(
            &self.config,
            &observation.expectation,
            &observation.audit.findings,
            FixScope::All,
        );
        info!(
            findings = observation.audit.findings.len(),
            errors = observation.audit.error_count(),
            "Audit complete"
        );
        Ok(Report::audit(
            &self.config.project_id,
            observation.project_number(),
            &observation.audit,
            &plan,
        ))
    }

    /// Audit, plan, apply and verify
    pub async fn fix(
        &self,
        scope: FixScope,
        confirm: &dyn Confirm,
        dry_run: bool,
    ) -> Result<FixOutcome, EngineError> {
        let Observation {
            mut snapshot,
            expectation,
            audit,
        } = self.observe().await?;

        let before = Audit {
            findings: audit
                .findings
                .iter()
                .filter(|f| scope.includes(f))
                .cloned()
                .collect(),
            unverifiable: audit.unverifiable.clone(),
        };
        let plan = plan::plan(&self.config, &expectation, &before.findings, scope);
        info!(steps = plan.len(), ?scope, "Planned remediation");

        if dry_run || plan.is_empty() {
            return Ok(FixOutcome {
                project_number: expectation.project_number,
                after: before.clone(),
                before,
                plan,
                results: vec![],
                verification_failures: vec![],
                dry_run,
            });
        }

        let executor = Executor::new(
            self.client.as_ref(),
            &self.config,
            confirm,
            self.failure_policy,
        );
        let results = executor.execute(&plan).await;
        let loader = self.loader();
        let (after, verification_failures) = executor
            .verify(&loader, &mut snapshot, expectation.project_number, &results)
            .await;
        let after = Audit {
            findings: after
                .findings
                .into_iter()
                .filter(|f| scope.includes(f))
                .collect(),
            unverifiable: after.unverifiable,
        };

        Ok(FixOutcome {
            project_number: expectation.project_number,
            before,
            plan,
            results,
            after,
            verification_failures,
            dry_run,
        })
    }

    /// Render a fix outcome
    pub fn fix_report(&self, outcome: &FixOutcome) -> Report {
        let report = Report::audit(
            &self.config.project_id,
            outcome.project_number,
            &outcome.before,
            &outcome.plan,
        );
        if outcome.dry_run || outcome.results.is_empty() {
            return report;
        }
        report.with_execution(&outcome.results, &outcome.after, &outcome.verification_failures)
    }

    /// Read-only decommission diagnostic for a repository that is no longer declared
    pub async fn cleanup(&self, repository: &str) -> Result<CleanupReport, EngineError> {
        let observation = self.observe().await?;
        cleanup::stale_references(
            self.client.as_ref(),
            &self.config,
            &observation.snapshot,
            observation.project_number(),
            repository,
        )
        .await
    }

    pub async fn diagnose_scheduler(&self) -> Result<Option<SchedulerDiagnosis>, EngineError> {
        let observation = self.observe().await?;
        Ok(scheduler::diagnose(
            &self.config,
            &observation.snapshot,
            observation.project_number(),
        ))
    }
}
