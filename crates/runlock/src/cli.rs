//! Command-line definition

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use runlock_core::{CommandName, Resource, ReviewRequestId};

#[derive(Debug, Parser)]
#[command(name = "runlock")]
#[command(version, about = "Inspect and manage runlock locks and review request status")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file layered over the global config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database directory, overriding config and environment
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resource locks
    Locks {
        #[command(subcommand)]
        action: LocksAction,
    },
    /// Global command locks
    Command {
        #[command(subcommand)]
        action: CommandAction,
    },
    /// Review request status records
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum LocksAction {
    /// List every held resource lock
    List,
    /// Show the lock on one resource
    Show(ResourceArgs),
    /// Release the lock on one resource
    Release(ResourceArgs),
    /// Release every lock held by a review request
    ReleaseReview {
        /// Repository full name, e.g. org/repo
        #[arg(long)]
        repo: String,
        /// Review request number
        #[arg(long)]
        number: u64,
    },
}

#[derive(Debug, Args)]
pub struct ResourceArgs {
    /// Repository full name, e.g. org/repo
    #[arg(long)]
    pub repo: String,
    /// Path of the resource within the repository
    #[arg(long)]
    pub path: String,
    /// Workspace name
    #[arg(long, default_value = "default")]
    pub workspace: String,
}

impl ResourceArgs {
    #[must_use]
    pub fn resource(&self) -> Resource {
        Resource::new(self.repo.as_str(), self.path.as_str())
    }
}

#[derive(Debug, Subcommand)]
pub enum CommandAction {
    /// Disable a command globally
    Lock { command: CommandName },
    /// Re-enable a command
    Unlock { command: CommandName },
    /// Show whether a command is locked
    Check { command: CommandName },
}

#[derive(Debug, Subcommand)]
pub enum StatusAction {
    /// Show a review request's status
    Show(ReviewArgs),
    /// Delete a review request's status
    Delete(ReviewArgs),
}

#[derive(Debug, Args)]
pub struct ReviewArgs {
    /// VCS hostname, e.g. github.com
    #[arg(long)]
    pub host: String,
    /// Repository full name, e.g. org/repo
    #[arg(long)]
    pub repo: String,
    /// Review request number
    #[arg(long)]
    pub number: u64,
}

impl ReviewArgs {
    #[must_use]
    pub fn id(&self) -> ReviewRequestId {
        ReviewRequestId::new(self.host.as_str(), self.repo.as_str(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_command_names_in_snake_case() {
        let cli = Cli::try_parse_from(["runlock", "command", "lock", "policy_check", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Command {
                action: CommandAction::Lock {
                    command: CommandName::PolicyCheck
                }
            }
        ));
    }

    #[test]
    fn workspace_defaults_to_default() {
        let cli = Cli::try_parse_from([
            "runlock", "locks", "show", "--repo", "org/repo", "--path", "prod",
        ])
        .unwrap();
        let Commands::Locks {
            action: LocksAction::Show(args),
        } = cli.command
        else {
            panic!("expected locks show");
        };
        assert_eq!(args.workspace, "default");
        assert_eq!(args.resource(), Resource::new("org/repo", "prod"));
    }

    #[test]
    fn rejects_unknown_command_name() {
        assert!(Cli::try_parse_from(["runlock", "command", "lock", "deploy"]).is_err());
    }
}
