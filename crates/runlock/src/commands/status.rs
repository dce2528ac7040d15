//! `runlock status ...`

use anyhow::{Context as _, Result};
use itertools::Itertools;
use runlock_core::ReviewRequestStatus;

use super::Context;
use crate::cli::StatusAction;

/// Run a `status` subcommand
///
/// # Errors
///
/// Returns an error if the review request identity is invalid or the store
/// fails.
pub async fn run(ctx: &Context, action: StatusAction) -> Result<()> {
    match action {
        StatusAction::Show(args) => {
            let id = args.id();
            let status = ctx
                .statuses
                .read_status(&id)
                .await
                .with_context(|| format!("reading status of {id}"))?;
            ctx.emit(&status, |status| {
                status
                    .as_ref()
                    .map_or_else(|| format!("No status recorded for {id}"), render)
            })
        }
        StatusAction::Delete(args) => {
            let id = args.id();
            ctx.statuses
                .delete_status(&id)
                .await
                .with_context(|| format!("deleting status of {id}"))?;
            ctx.emit(&serde_json::json!({ "review_request": id, "deleted": true }), |_| {
                format!("Deleted status of {id}")
            })
        }
    }
}

fn render(status: &ReviewRequestStatus) -> String {
    let request = &status.review_request;
    let header = format!(
        "{} #{} at {} by {}",
        request.base_repo.full_name, request.number, request.head_commit, request.author
    );
    let projects = status.projects.iter().map(|p| {
        let name = if p.project_name.is_empty() {
            String::new()
        } else {
            format!(" ({})", p.project_name)
        };
        let policies = p
            .policy_statuses
            .iter()
            .map(|s| format!("{}={}", s.policy_set_name, if s.passed { "pass" } else { "fail" }))
            .join(", ");
        if policies.is_empty() {
            format!("  {} [{}]{name}: {}", p.relative_path, p.workspace, p.status)
        } else {
            format!(
                "  {} [{}]{name}: {} policies: {policies}",
                p.relative_path, p.workspace, p.status
            )
        }
    });
    std::iter::once(header).chain(projects).join("\n")
}
