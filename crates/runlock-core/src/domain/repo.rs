//! Repository and resource identity types

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of version control host serving a repository.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VcsHostKind {
    Github,
    Gitlab,
    BitbucketCloud,
    BitbucketServer,
    AzureDevops,
    Gitea,
}

/// A version control host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VcsHost {
    /// Host name, e.g. `github.com`
    pub hostname: String,
    /// Which kind of host this is
    pub kind: VcsHostKind,
}

/// A repository on a VCS host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name` form
    pub full_name: String,
    /// Host serving the repository
    pub vcs_host: VcsHost,
}

impl Repository {
    #[must_use]
    pub fn new(full_name: impl Into<String>, hostname: impl Into<String>, kind: VcsHostKind) -> Self {
        Self {
            full_name: full_name.into(),
            vcs_host: VcsHost {
                hostname: hostname.into(),
                kind,
            },
        }
    }
}

/// A lockable unit of infrastructure: a directory inside a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Repository the resource lives in (`owner/name`)
    pub repo_full_name: String,
    /// Repository-relative directory
    pub path: String,
}

impl Resource {
    #[must_use]
    pub fn new(repo_full_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.repo_full_name, self.path)
    }
}
