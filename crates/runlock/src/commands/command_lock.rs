//! `runlock command ...`

use anyhow::{Context as _, Result};
use chrono::Utc;
use runlock_core::CommandLock;

use super::Context;
use crate::cli::CommandAction;

/// Run a `command` subcommand
///
/// # Errors
///
/// Returns an error if the store fails, if `lock` finds the command already
/// locked, or if `unlock` finds it not locked.
pub async fn run(ctx: &Context, action: CommandAction) -> Result<()> {
    match action {
        CommandAction::Lock { command } => {
            let lock = ctx
                .locks
                .lock_command(command, Utc::now())
                .await
                .with_context(|| format!("locking command {command}"))?;
            ctx.emit(&lock, |lock| format!("Locked {}", describe(lock)))
        }
        CommandAction::Unlock { command } => {
            ctx.locks
                .unlock_command(command)
                .await
                .with_context(|| format!("unlocking command {command}"))?;
            ctx.emit(&serde_json::json!({ "command": command, "unlocked": true }), |_| {
                format!("Unlocked {command}")
            })
        }
        CommandAction::Check { command } => {
            let lock = ctx.locks.check_command_lock(command).await?;
            ctx.emit(&lock, |lock| {
                lock.as_ref()
                    .map_or_else(|| format!("{command} is not locked"), describe)
            })
        }
    }
}

fn describe(lock: &CommandLock) -> String {
    lock.lock_time().map_or_else(
        || format!("{} (no lock time recorded)", lock.command),
        |at| format!("{} since {}", lock.command, at.to_rfc3339()),
    )
}
