//! Lock record types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::{repo::Resource, review::ReviewRequest};

/// An exclusive claim on a resource within one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Resource being locked
    pub resource: Resource,
    /// Workspace the lock applies to
    pub workspace: String,
    /// Review request that took the lock
    pub review_request: ReviewRequest,
    /// User who triggered the locking command
    pub user: String,
    /// When acquired
    pub acquired_at: DateTime<Utc>,
}

impl ResourceLock {
    /// Create a lock candidate stamped with the current time
    #[must_use]
    pub fn new(
        resource: Resource,
        workspace: impl Into<String>,
        review_request: ReviewRequest,
        user: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            workspace: workspace.into(),
            review_request,
            user: user.into(),
            acquired_at: Utc::now(),
        }
    }

    /// Whether this lock was taken by the given review request of the given repository
    #[must_use]
    pub fn held_by(&self, repo_full_name: &str, number: u64) -> bool {
        self.resource.repo_full_name == repo_full_name && self.review_request.number == number
    }
}

/// Command types that can be locked globally.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandName {
    Plan,
    Apply,
    PolicyCheck,
    ApprovePolicies,
    Unlock,
    Version,
    Import,
    State,
}

/// Metadata stored with a command lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommandLockMetadata {
    /// Unix seconds at acquisition; zero means unset
    pub unix_time: i64,
}

/// A global claim on one command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLock {
    pub command: CommandName,
    #[serde(default)]
    pub metadata: CommandLockMetadata,
}

impl CommandLock {
    #[must_use]
    pub fn new(command: CommandName, locked_at: DateTime<Utc>) -> Self {
        Self {
            command,
            metadata: CommandLockMetadata {
                unix_time: locked_at.timestamp(),
            },
        }
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.metadata.unix_time != 0
    }

    /// Acquisition time, if the lock carries one
    #[must_use]
    pub fn lock_time(&self) -> Option<DateTime<Utc>> {
        if !self.is_locked() {
            return None;
        }
        Utc.timestamp_opt(self.metadata.unix_time, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn command_names_are_snake_case() {
        let names: Vec<String> = CommandName::iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "plan",
                "apply",
                "policy_check",
                "approve_policies",
                "unlock",
                "version",
                "import",
                "state"
            ]
        );
        assert_eq!(
            "approve_policies".parse::<CommandName>().ok(),
            Some(CommandName::ApprovePolicies)
        );
    }

    #[test]
    fn command_lock_time_round_trips_seconds() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).single();
        let Some(at) = at else {
            return;
        };
        let lock = CommandLock::new(CommandName::Apply, at);
        assert!(lock.is_locked());
        assert_eq!(lock.lock_time(), Some(at));
    }

    #[test]
    fn zero_timestamp_is_not_locked() {
        let lock = CommandLock {
            command: CommandName::Plan,
            metadata: CommandLockMetadata::default(),
        };
        assert!(!lock.is_locked());
        assert_eq!(lock.lock_time(), None);
    }
}
