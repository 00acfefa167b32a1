/// Run-level errors of the engine
///
/// Absent resources and mismatched attributes are findings, not errors. These
/// variants cover what stops a comparison or a remediation from completing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Principals cannot be computed without the numeric project number
    #[error("could not resolve the project number of '{project_id}': {reason}")]
    ProjectNumberUnresolved { project_id: String, reason: String },

    #[error("repository '{repository}' is still declared; remove it from the configuration first")]
    RepositoryStillDeclared { repository: String },

    #[error("{action} was declined")]
    ConfirmationDeclined { action: String },

    /// An action was applied but its finding still reproduces afterwards
    #[error("{finding} still present after {action} (equivalent command: {command})")]
    RemediationVerificationFailed {
        action: String,
        finding: String,
        command: String,
    },
}
