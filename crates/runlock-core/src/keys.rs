//! Key schema shared by the lock manager and the status store.
//!
//! | record               | key                                   |
//! |----------------------|---------------------------------------|
//! | resource lock        | `pr/<repoFullName>/<path>/<workspace>` |
//! | command lock         | `global/<command>/lock`               |
//! | review status        | `<hostname>::<repoFullName>::<number>` |
//!
//! Resource locks and command locks live in disjoint namespaces so a scan
//! over `pr/*` never sees a command lock.

use crate::{
    domain::{CommandName, Resource, ReviewRequestId},
    store::KeyPattern,
};

/// Namespace tag for resource locks.
pub const RESOURCE_LOCK_NAMESPACE: &str = "pr";

/// Namespace tag for command locks.
pub const COMMAND_LOCK_NAMESPACE: &str = "global";

/// Separator between the parts of a review status key.
pub const REVIEW_KEY_SEPARATOR: &str = "::";

/// Errors raised while deriving keys or key patterns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("vcs hostname {hostname:?} contains illegal string \"::\"")]
    IllegalHostname { hostname: String },

    #[error("repo name {repo:?} contains illegal string \"::\"")]
    IllegalRepoName { repo: String },

    #[error("invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[must_use]
pub fn resource_lock_key(resource: &Resource, workspace: &str) -> String {
    format!(
        "{RESOURCE_LOCK_NAMESPACE}/{}/{}/{workspace}",
        resource.repo_full_name, resource.path
    )
}

/// Pattern matching every resource lock.
pub fn resource_lock_pattern() -> Result<KeyPattern, KeyError> {
    KeyPattern::prefix(&format!("{RESOURCE_LOCK_NAMESPACE}/"))
}

/// Pattern matching the resource locks of one repository.
pub fn repo_lock_pattern(repo_full_name: &str) -> Result<KeyPattern, KeyError> {
    KeyPattern::prefix(&format!("{RESOURCE_LOCK_NAMESPACE}/{repo_full_name}/"))
}

#[must_use]
pub fn command_lock_key(command: CommandName) -> String {
    format!("{COMMAND_LOCK_NAMESPACE}/{command}/lock")
}

/// Key of a review request's status record.
///
/// # Errors
///
/// Returns a `KeyError` if the hostname or repository name contains
/// [`REVIEW_KEY_SEPARATOR`], which would make keys ambiguous.
pub fn review_status_key(id: &ReviewRequestId) -> Result<String, KeyError> {
    if id.hostname.contains(REVIEW_KEY_SEPARATOR) {
        return Err(KeyError::IllegalHostname {
            hostname: id.hostname.clone(),
        });
    }
    if id.repo_full_name.contains(REVIEW_KEY_SEPARATOR) {
        return Err(KeyError::IllegalRepoName {
            repo: id.repo_full_name.clone(),
        });
    }
    Ok(format!(
        "{}{REVIEW_KEY_SEPARATOR}{}{REVIEW_KEY_SEPARATOR}{}",
        id.hostname, id.repo_full_name, id.number
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_lock_key_format() {
        let resource = Resource::new("org/repo", "env/prod");
        assert_eq!(
            resource_lock_key(&resource, "default"),
            "pr/org/repo/env/prod/default"
        );
    }

    #[test]
    fn command_lock_key_format() {
        assert_eq!(command_lock_key(CommandName::Apply), "global/apply/lock");
        assert_eq!(
            command_lock_key(CommandName::PolicyCheck),
            "global/policy_check/lock"
        );
    }

    #[test]
    fn review_status_key_format() -> Result<(), KeyError> {
        let id = ReviewRequestId::new("github.com", "org/repo", 42);
        assert_eq!(review_status_key(&id)?, "github.com::org/repo::42");
        Ok(())
    }

    #[test]
    fn review_status_key_rejects_separator_in_hostname() {
        let id = ReviewRequestId::new("evil::host", "org/repo", 1);
        assert_eq!(
            review_status_key(&id),
            Err(KeyError::IllegalHostname {
                hostname: "evil::host".into()
            })
        );
    }

    #[test]
    fn review_status_key_rejects_separator_in_repo() {
        let id = ReviewRequestId::new("github.com", "org::repo", 1);
        let err = review_status_key(&id).err();
        assert_eq!(
            err,
            Some(KeyError::IllegalRepoName {
                repo: "org::repo".into()
            })
        );
        let message = err.map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("\"org::repo\""));
    }

    #[test]
    fn namespace_patterns_do_not_overlap() -> Result<(), KeyError> {
        let locks = resource_lock_pattern()?;
        assert!(locks.matches("pr/org/repo/prod/default"));
        assert!(!locks.matches("global/plan/lock"));
        // a review key whose host starts with the namespace tag
        assert!(!locks.matches("prgit.example.com::org/repo::3"));
        Ok(())
    }

    #[test]
    fn repo_pattern_is_scoped_to_exact_repo() -> Result<(), KeyError> {
        let pattern = repo_lock_pattern("org/repo")?;
        assert!(pattern.matches("pr/org/repo/prod/default"));
        assert!(!pattern.matches("pr/org/repo-other/prod/default"));
        Ok(())
    }
}
