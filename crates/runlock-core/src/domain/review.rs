//! Review request (pull/merge request) types

use serde::{Deserialize, Serialize};

use super::repo::Repository;

/// A collaborative change proposal that triggers commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Number of the request within its repository
    pub number: u64,
    /// Latest commit at the time of the run
    pub head_commit: String,
    /// Username that opened the request
    pub author: String,
    /// Web URL of the request
    #[serde(default)]
    pub url: String,
    /// Repository the request merges into
    pub base_repo: Repository,
}

impl ReviewRequest {
    /// Storage identity of this request.
    #[must_use]
    pub fn id(&self) -> ReviewRequestId {
        ReviewRequestId {
            hostname: self.base_repo.vcs_host.hostname.clone(),
            repo_full_name: self.base_repo.full_name.clone(),
            number: self.number,
        }
    }
}

/// The fields that identify a review request's status record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewRequestId {
    pub hostname: String,
    pub repo_full_name: String,
    pub number: u64,
}

impl ReviewRequestId {
    #[must_use]
    pub fn new(hostname: impl Into<String>, repo_full_name: impl Into<String>, number: u64) -> Self {
        Self {
            hostname: hostname.into(),
            repo_full_name: repo_full_name.into(),
            number,
        }
    }
}

impl std::fmt::Display for ReviewRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.hostname, self.repo_full_name, self.number)
    }
}
