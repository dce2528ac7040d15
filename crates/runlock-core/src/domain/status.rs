//! Review request status records and the command results that feed them

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{lock::CommandName, review::ReviewRequest};

/// Latest plan/apply state of one project.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanStatus {
    ErroredPlan,
    Planned,
    PlannedNoChanges,
    ErroredApply,
    Applied,
    Discarded,
    ErroredPolicyCheck,
    PassedPolicyCheck,
}

/// Outcome of evaluating one named policy set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySetStatus {
    pub policy_set_name: String,
    pub passed: bool,
    #[serde(default)]
    pub approvals: u32,
}

impl PolicySetStatus {
    #[must_use]
    pub fn new(policy_set_name: impl Into<String>, passed: bool) -> Self {
        Self {
            policy_set_name: policy_set_name.into(),
            passed,
            approvals: 0,
        }
    }
}

/// One project's latest result inside a [`ReviewRequestStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOutcome {
    pub workspace: String,
    pub relative_path: String,
    #[serde(default)]
    pub project_name: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub policy_statuses: Vec<PolicySetStatus>,
}

impl ProjectOutcome {
    /// Whether this outcome is the entry a result should be merged into.
    #[must_use]
    pub fn matches(&self, result: &ProjectResult) -> bool {
        self.workspace == result.workspace
            && self.relative_path == result.relative_path
            && self.project_name == result.project_name
    }
}

impl From<&ProjectResult> for ProjectOutcome {
    fn from(result: &ProjectResult) -> Self {
        Self {
            workspace: result.workspace.clone(),
            relative_path: result.relative_path.clone(),
            project_name: result.project_name.clone(),
            status: result.plan_status(),
            policy_statuses: result.policy_statuses(),
        }
    }
}

/// Aggregated outcome record for one review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequestStatus {
    pub review_request: ReviewRequest,
    #[serde(default)]
    pub projects: Vec<ProjectOutcome>,
}

impl ReviewRequestStatus {
    #[must_use]
    pub const fn new(review_request: ReviewRequest) -> Self {
        Self {
            review_request,
            projects: Vec::new(),
        }
    }

    /// Number of projects currently in `status`
    #[must_use]
    pub fn status_count(&self, status: PlanStatus) -> usize {
        self.projects.iter().filter(|p| p.status == status).count()
    }

    /// First project recorded for the workspace and path
    #[must_use]
    pub fn project(&self, workspace: &str, relative_path: &str) -> Option<&ProjectOutcome> {
        self.projects
            .iter()
            .find(|p| p.workspace == workspace && p.relative_path == relative_path)
    }
}

/// Commands whose results are recorded per project.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectCommand {
    Plan,
    PolicyCheck,
    ApprovePolicies,
    Apply,
}

impl From<ProjectCommand> for CommandName {
    fn from(command: ProjectCommand) -> Self {
        match command {
            ProjectCommand::Plan => Self::Plan,
            ProjectCommand::PolicyCheck => Self::PolicyCheck,
            ProjectCommand::ApprovePolicies => Self::ApprovePolicies,
            ProjectCommand::Apply => Self::Apply,
        }
    }
}

/// How a project command finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum CommandOutcome {
    Succeeded,
    /// Plan succeeded and found nothing to change
    SucceededNoChanges,
    /// The command ran and reported a failure (e.g. a policy violation)
    Failed(String),
    /// The command could not run
    Errored(String),
}

impl CommandOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Errored(_))
    }
}

/// Result of running one command against one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectResult {
    pub command: ProjectCommand,
    pub workspace: String,
    pub relative_path: String,
    #[serde(default)]
    pub project_name: String,
    pub outcome: CommandOutcome,
    #[serde(default)]
    pub policy_results: Vec<PolicySetStatus>,
}

impl ProjectResult {
    #[must_use]
    pub fn new(
        command: ProjectCommand,
        workspace: impl Into<String>,
        relative_path: impl Into<String>,
        outcome: CommandOutcome,
    ) -> Self {
        Self {
            command,
            workspace: workspace.into(),
            relative_path: relative_path.into(),
            project_name: String::new(),
            outcome,
            policy_results: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_project_name(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = project_name.into();
        self
    }

    #[must_use]
    pub fn with_policy_results(mut self, policy_results: Vec<PolicySetStatus>) -> Self {
        self.policy_results = policy_results;
        self
    }

    /// Plan status this result leaves the project in
    #[must_use]
    pub fn plan_status(&self) -> PlanStatus {
        let failed = self.outcome.is_failure();
        match self.command {
            ProjectCommand::Plan if failed => PlanStatus::ErroredPlan,
            ProjectCommand::Plan => match self.outcome {
                CommandOutcome::SucceededNoChanges => PlanStatus::PlannedNoChanges,
                _ => PlanStatus::Planned,
            },
            ProjectCommand::PolicyCheck | ProjectCommand::ApprovePolicies if failed => {
                PlanStatus::ErroredPolicyCheck
            }
            ProjectCommand::PolicyCheck | ProjectCommand::ApprovePolicies => {
                PlanStatus::PassedPolicyCheck
            }
            ProjectCommand::Apply if failed => PlanStatus::ErroredApply,
            ProjectCommand::Apply => PlanStatus::Applied,
        }
    }

    /// Policy set results, unique by name. A repeated name keeps its first
    /// position and its last value.
    #[must_use]
    pub fn policy_statuses(&self) -> Vec<PolicySetStatus> {
        self.policy_results
            .iter()
            .fold(Vec::new(), |mut acc: Vec<PolicySetStatus>, policy| {
                match acc
                    .iter()
                    .position(|p| p.policy_set_name == policy.policy_set_name)
                {
                    Some(idx) => acc[idx] = policy.clone(),
                    None => acc.push(policy.clone()),
                }
                acc
            })
    }
}
