use serde::Serialize;
use url::Url;

use super::config::TrustConfig;
use super::diff::{invoker_violations, Finding};
use super::expectation::{ROLE_RUN_INVOKER, ROLE_TOKEN_CREATOR};
use super::principal::{scheduler_service_agent, service_account_member};
use super::snapshot::{Fetched, Snapshot};

const RUN_APP_SUFFIX: &str = ".run.app";

/// Extract the Cloud Run service a scheduler URI points at
///
/// The host must be a `*.run.app` host. Its first label is matched against the
/// declared service names, either exactly or as `{service}-{hash}`; the longest
/// declared name wins. When no declared name matches, the label itself is
/// returned. Returns `None` when the URI cannot be interpreted, never an empty
/// string.
pub fn target_service_from_uri(uri: &str, services: &[String]) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let host = url.host_str()?;
    if !host.ends_with(RUN_APP_SUFFIX) {
        return None;
    }
    let label = host.split('.').next().filter(|l| !l.is_empty())?;

    let declared = services
        .iter()
        .filter(|s| {
            label == s.as_str()
                || label
                    .strip_prefix(s.as_str())
                    .is_some_and(|rest| rest.starts_with('-'))
        })
        .max_by_key(|s| s.len());

    Some(declared.cloned().unwrap_or_else(|| label.to_string()))
}

/// Secondary report about the scheduler job's authentication chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerDiagnosis {
    pub job: String,
    pub region: String,
    /// Absent when the job does not exist or could not be fetched
    pub http_method: Option<String>,
    pub uri: Option<String>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub schedule: Option<String>,
    pub time_zone: Option<String>,
    pub target_service: Option<String>,
    /// Whether the job's subject holds `roles/run.invoker` on the target service
    pub subject_can_invoke: bool,
    /// Whether the scheduler service agent may mint tokens for the subject
    pub agent_can_mint_tokens: bool,
    pub findings: Vec<Finding>,
    pub error: Option<String>,
}

/// Diagnose the declared scheduler job against a loaded snapshot
///
/// Returns `None` when no scheduler job is declared.
pub fn diagnose(
    config: &TrustConfig,
    snapshot: &Snapshot,
    project_number: u64,
) -> Option<SchedulerDiagnosis> {
    let declared = config.scheduler.as_ref()?;
    let mut diagnosis = SchedulerDiagnosis {
        job: declared.job.clone(),
        region: declared.region.clone(),
        http_method: None,
        uri: None,
        subject: None,
        audience: None,
        schedule: None,
        time_zone: None,
        target_service: None,
        subject_can_invoke: false,
        agent_can_mint_tokens: false,
        findings: vec![],
        error: None,
    };

    let job = match &snapshot.scheduler_job {
        Some(Fetched::Present(job)) => job,
        Some(Fetched::Unreachable(e)) => {
            diagnosis.error = Some(e.clone());
            return Some(diagnosis);
        }
        _ => {
            diagnosis.error = Some(format!("scheduler job '{}' not found", declared.job));
            return Some(diagnosis);
        }
    };

    diagnosis.http_method = Some(job.http_method.to_uppercase());
    diagnosis.uri = Some(job.uri.clone());
    diagnosis.subject = job.oidc_service_account.clone();
    diagnosis.audience = job.oidc_audience.clone();
    diagnosis.schedule = Some(job.schedule.clone());
    diagnosis.time_zone = Some(job.time_zone.clone());
    diagnosis.target_service = target_service_from_uri(&job.uri, &config.services);

    if let (Some(subject), Some(service)) = (&diagnosis.subject, &diagnosis.target_service) {
        let member = service_account_member(subject);
        diagnosis.subject_can_invoke = snapshot
            .service_policies
            .get(service)
            .and_then(Fetched::present)
            .is_some_and(|policy| policy.has(ROLE_RUN_INVOKER, &member));

        let agent = service_account_member(&scheduler_service_agent(project_number));
        diagnosis.agent_can_mint_tokens = snapshot
            .service_account_policies
            .get(subject)
            .and_then(Fetched::present)
            .is_some_and(|policy| policy.has(ROLE_TOKEN_CREATOR, &agent));
    }

    diagnosis.findings = invoker_violations(
        config,
        snapshot,
        &job.uri,
        job.oidc_service_account.as_deref(),
        &job.name,
    );
    Some(diagnosis)
}
