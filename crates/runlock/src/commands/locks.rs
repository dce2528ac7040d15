//! `runlock locks ...`

use anyhow::{Context as _, Result};
use itertools::Itertools;
use runlock_core::{PartialResult, ResourceLock};

use super::Context;
use crate::cli::LocksAction;

/// Run a `locks` subcommand
///
/// # Errors
///
/// Returns an error if the store fails or holds an unreadable lock. For
/// listings and bulk releases the locks handled before the failure are
/// printed first.
pub async fn run(ctx: &Context, action: LocksAction) -> Result<()> {
    match action {
        LocksAction::List => {
            let count = emit_partial(ctx, ctx.locks.list().await, "No locks held")?;
            tracing::debug!(count, "listed locks");
            Ok(())
        }
        LocksAction::Show(args) => {
            let lock = ctx
                .locks
                .get_lock(&args.resource(), &args.workspace)
                .await
                .with_context(|| format!("reading lock on {}", args.resource()))?;
            ctx.emit(&lock, |lock| {
                lock.as_ref().map_or_else(
                    || format!("{} [{}] is not locked", args.resource(), args.workspace),
                    describe,
                )
            })
        }
        LocksAction::Release(args) => {
            let released = ctx
                .locks
                .unlock(&args.resource(), &args.workspace)
                .await
                .with_context(|| format!("releasing lock on {}", args.resource()))?;
            ctx.emit(&released, |released| {
                released.as_ref().map_or_else(
                    || format!("{} [{}] was not locked", args.resource(), args.workspace),
                    |lock| format!("Released {}", describe(lock)),
                )
            })
        }
        LocksAction::ReleaseReview { repo, number } => {
            let released = ctx.locks.unlock_by_review_request(&repo, number).await;
            let count = emit_partial(ctx, released, "No locks released")
                .with_context(|| format!("releasing locks of {repo}#{number}"))?;
            tracing::info!(repo, number, count, "released review request locks");
            Ok(())
        }
    }
}

/// Print the locks an enumeration produced, even when it stopped early.
fn emit_partial(ctx: &Context, result: PartialResult<ResourceLock>, empty: &str) -> Result<usize> {
    let (locks, failure) = match result {
        Ok(locks) => (locks, None),
        Err(err) => (err.partial, Some(err.source)),
    };
    ctx.emit(&locks, |locks| {
        if locks.is_empty() && failure.is_none() {
            empty.to_string()
        } else {
            locks.iter().map(describe).join("\n")
        }
    })?;
    match failure {
        Some(source) => Err(source.into()),
        None => Ok(locks.len()),
    }
}

/// One-line summary of a lock.
fn describe(lock: &ResourceLock) -> String {
    format!(
        "{} [{}] held by #{} ({}) since {}",
        lock.resource,
        lock.workspace,
        lock.review_request.number,
        lock.user,
        lock.acquired_at.to_rfc3339()
    )
}
