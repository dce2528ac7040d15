//! Pure merge rules for review request status records.
//!
//! Nothing here touches the store: [`crate::status::StatusStore`] loads the
//! current record, calls into this module and writes the result back.

use crate::domain::{
    PlanStatus, PolicySetStatus, ProjectOutcome, ProjectResult, ReviewRequest,
    ReviewRequestStatus,
};

/// Fold a batch of command results into the current status of `request`.
///
/// A missing record, or one recorded for a different head commit, is
/// discarded and rebuilt from `results` alone. Otherwise each result updates
/// the outcome with the same workspace, path and project name, or is
/// appended when there is none.
///
/// Both paths fold `results` in order, so repeated results for one
/// workspace, path and project name collapse into a single outcome carrying
/// the last one's status. A rebuilt record holds one outcome per distinct
/// identity, not one per input.
#[must_use]
pub fn merge_results(
    current: Option<ReviewRequestStatus>,
    request: &ReviewRequest,
    results: &[ProjectResult],
) -> ReviewRequestStatus {
    let base = match current {
        Some(status) if status.review_request.head_commit == request.head_commit => status,
        _ => ReviewRequestStatus::new(request.clone()),
    };
    results.iter().fold(base, apply_result)
}

fn apply_result(mut status: ReviewRequestStatus, result: &ProjectResult) -> ReviewRequestStatus {
    match status.projects.iter().position(|p| p.matches(result)) {
        Some(idx) => {
            let existing = &status.projects[idx];
            let updated = ProjectOutcome {
                status: result.plan_status(),
                policy_statuses: merge_policy_statuses(
                    &existing.policy_statuses,
                    result.policy_statuses(),
                ),
                ..existing.clone()
            };
            status.projects[idx] = updated;
        }
        None => status.projects.push(ProjectOutcome::from(result)),
    }
    status
}

/// Combine stored policy results with incoming ones.
///
/// When results are already stored, only sets named in `incoming` are
/// replaced and the others keep their values; sets that are new in
/// `incoming` are not added. An empty stored list is replaced wholesale.
#[must_use]
pub fn merge_policy_statuses(
    existing: &[PolicySetStatus],
    incoming: Vec<PolicySetStatus>,
) -> Vec<PolicySetStatus> {
    if existing.is_empty() {
        return incoming;
    }
    existing
        .iter()
        .map(|old| {
            incoming
                .iter()
                .find(|new| new.policy_set_name == old.policy_set_name)
                .unwrap_or(old)
                .clone()
        })
        .collect()
}

/// Set the status of the first project recorded for `workspace` and
/// `relative_path`. Returns whether a project matched.
pub fn set_project_status(
    status: &mut ReviewRequestStatus,
    workspace: &str,
    relative_path: &str,
    new_status: PlanStatus,
) -> bool {
    let Some(project) = status
        .projects
        .iter_mut()
        .find(|p| p.workspace == workspace && p.relative_path == relative_path)
    else {
        return false;
    };
    project.status = new_status;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommandOutcome, ProjectCommand, Repository, VcsHostKind};

    fn request(head_commit: &str) -> ReviewRequest {
        ReviewRequest {
            number: 5,
            head_commit: head_commit.into(),
            author: "dev".into(),
            url: String::new(),
            base_repo: Repository::new("org/repo", "github.com", VcsHostKind::Github),
        }
    }

    fn plan(workspace: &str, path: &str) -> ProjectResult {
        ProjectResult::new(ProjectCommand::Plan, workspace, path, CommandOutcome::Succeeded)
    }

    fn apply(workspace: &str, path: &str) -> ProjectResult {
        ProjectResult::new(ProjectCommand::Apply, workspace, path, CommandOutcome::Succeeded)
    }

    #[test]
    fn fresh_record_keeps_input_order() {
        let status = merge_results(
            None,
            &request("abc"),
            &[plan("default", "b"), plan("default", "a")],
        );

        let paths: Vec<&str> = status
            .projects
            .iter()
            .map(|p| p.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["b", "a"]);
        assert_eq!(status.review_request.head_commit, "abc");
    }

    #[test]
    fn same_commit_updates_matching_project_and_keeps_others() {
        let first = merge_results(
            None,
            &request("abc"),
            &[plan("default", "prod"), plan("default", "staging")],
        );
        let second = merge_results(Some(first), &request("abc"), &[apply("default", "prod")]);

        assert_eq!(second.projects.len(), 2);
        assert_eq!(second.projects[0].status, PlanStatus::Applied);
        assert_eq!(second.projects[1].status, PlanStatus::Planned);
    }

    #[test]
    fn same_commit_appends_unknown_project() {
        let first = merge_results(None, &request("abc"), &[plan("default", "prod")]);
        let second = merge_results(
            Some(first),
            &request("abc"),
            &[plan("default", "prod").with_project_name("named")],
        );

        assert_eq!(second.projects.len(), 2);
        assert_eq!(second.projects[1].project_name, "named");
    }

    #[test]
    fn new_commit_discards_previous_outcomes() {
        let first = merge_results(
            None,
            &request("abc"),
            &[plan("default", "prod"), plan("default", "staging")],
        );
        let second = merge_results(Some(first), &request("def"), &[apply("default", "prod")]);

        assert_eq!(second.projects.len(), 1);
        assert_eq!(second.projects[0].status, PlanStatus::Applied);
        assert_eq!(second.review_request.head_commit, "def");
    }

    #[test]
    fn duplicate_results_collapse_into_one_outcome() {
        let status = merge_results(
            None,
            &request("abc"),
            &[plan("default", "prod"), apply("default", "prod")],
        );

        assert_eq!(status.projects.len(), 1);
        assert_eq!(status.projects[0].status, PlanStatus::Applied);
    }

    #[test]
    fn stored_policy_sets_are_updated_by_name() {
        let existing = vec![PolicySetStatus::new("A", false), PolicySetStatus::new("B", true)];
        let merged = merge_policy_statuses(
            &existing,
            vec![PolicySetStatus::new("A", true), PolicySetStatus::new("C", true)],
        );

        assert_eq!(
            merged,
            vec![PolicySetStatus::new("A", true), PolicySetStatus::new("B", true)]
        );
    }

    #[test]
    fn empty_policy_list_takes_incoming_wholesale() {
        let incoming = vec![PolicySetStatus::new("A", true), PolicySetStatus::new("C", false)];
        assert_eq!(merge_policy_statuses(&[], incoming.clone()), incoming);
    }

    #[test]
    fn set_project_status_touches_first_match_only() {
        let mut status = merge_results(
            None,
            &request("abc"),
            &[
                plan("default", "prod"),
                plan("default", "prod").with_project_name("other"),
            ],
        );

        assert!(set_project_status(
            &mut status,
            "default",
            "prod",
            PlanStatus::Discarded
        ));
        assert_eq!(status.projects[0].status, PlanStatus::Discarded);
        assert_eq!(status.projects[1].status, PlanStatus::Planned);
        assert!(!set_project_status(
            &mut status,
            "default",
            "missing",
            PlanStatus::Discarded
        ));
    }
}
