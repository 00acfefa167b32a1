use serde::Serialize;
use std::fmt;


const PRINCIPAL_SET_PREFIX: &str = "principalSet://iam.googleapis.com/projects/";
const POOLS_SEGMENT: &str = "/locations/global/workloadIdentityPools/";

/// Attribute carrying the GitHub repository (`owner/name`)
pub const REPOSITORY_ATTRIBUTE: &str = "repository";

/// A workload identity principal set selecting tokens by one mapped attribute
///
/// The project component is always the numeric project **number**; a project id
/// string in that position yields a principal the control plane never matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PrincipalSet {
    pub project_number: u64,
    pub pool_id: String,
    pub attribute: String,
    pub value: String,
}

impl PrincipalSet {
    /// Principal admitting every token whose `attribute.repository` equals `repository`
    pub fn for_repository(project_number: u64, pool_id: &str, repository: &str) -> Self {
        Self {
            project_number,
            pool_id: pool_id.to_string(),
            attribute: REPOSITORY_ATTRIBUTE.to_string(),
            value: repository.to_string(),
        }
    }

    /// Parse a `principalSet://` member string
    ///
    /// Returns `None` for anything that is not an attribute-based principal set
    /// with a numeric project.
    pub fn parse(member: &str) -> Option<Self> {
        let rest = member.strip_prefix(PRINCIPAL_SET_PREFIX)?;
        let (number, rest) = rest.split_once(POOLS_SEGMENT)?;
        let project_number = number.parse().ok()?;
        let (pool_id, rest) = rest.split_once('/')?;
        let rest = rest.strip_prefix("attribute.")?;
        let (attribute, value) = rest.split_once('/')?;
        if pool_id.is_empty() || attribute.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self {
            project_number,
            pool_id: pool_id.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        })
    }

    /// Whether this principal belongs to the given pool and selects by repository
    pub fn is_repository_principal_of(&self, project_number: u64, pool_id: &str) -> bool {
        self.project_number == project_number
            && self.pool_id == pool_id
            && self.attribute == REPOSITORY_ATTRIBUTE
    }
}

impl fmt::Display for PrincipalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}/attribute.{}/{}",
            PRINCIPAL_SET_PREFIX,
            self.project_number,
            POOLS_SEGMENT,
            self.pool_id,
            self.attribute,
            self.value
        )
    }
}

/// IAM member string of a service account
pub fn service_account_member(email: &str) -> String {
    format!("serviceAccount:{}", email)
}

/// Cloud Scheduler service agent of a project
pub fn scheduler_service_agent(project_number: u64) -> String {
    format!(
        "service-{}@gcp-sa-cloudscheduler.iam.gserviceaccount.com",
        project_number
    )
}

/// A parsed IAM member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    ServiceAccount(String),
    PrincipalSet(PrincipalSet),
    Other(String),
}

impl Member {
    pub fn parse(member: &str) -> Self {
        if let Some(email) = member.strip_prefix("serviceAccount:") {
            return Member::ServiceAccount(email.to_string());
        }
        match PrincipalSet::parse(member) {
            Some(principal) => Member::PrincipalSet(principal),
            None => Member::Other(member.to_string()),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::ServiceAccount(email) => write!(f, "serviceAccount:{}", email),
            Member::PrincipalSet(principal) => write!(f, "{}", principal),
            Member::Other(raw) => write!(f, "{}", raw),
        }
    }
}
