//! Store-backed review request status records.
//!
//! Each review request has at most one [`ReviewRequestStatus`], stored under
//! `<hostname>::<repoFullName>::<number>`. The merge rules live in
//! [`crate::merge`]; this type only loads, merges and writes back.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    codec::{decode, encode},
    domain::{PlanStatus, ProjectResult, ReviewRequest, ReviewRequestId, ReviewRequestStatus},
    error::{Error, Result},
    keys, merge,
    store::KvStore,
};

const STATUS: &str = "review request status";

/// Status records over a shared store.
#[derive(Debug, Clone)]
pub struct StatusStore {
    store: Arc<dyn KvStore>,
}

impl StatusStore {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Set the status of the first project recorded for `workspace` and
    /// `relative_path`.
    ///
    /// Does nothing if the review request has no record yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the request's key cannot be derived,
    /// otherwise `Error::Transaction` or a serialization error.
    pub async fn update_project_status(
        &self,
        request: &ReviewRequest,
        workspace: &str,
        relative_path: &str,
        new_status: PlanStatus,
    ) -> Result<()> {
        let key = keys::review_status_key(&request.id())?;
        let Some(mut status) = self.load(&key).await? else {
            debug!(key, "no status recorded, skipping project update");
            return Ok(());
        };

        if !merge::set_project_status(&mut status, workspace, relative_path, new_status) {
            debug!(key, workspace, relative_path, "no project matched status update");
        }
        self.save(&key, &status).await?;
        info!(key, workspace, relative_path, status = %new_status, "updated project status");
        Ok(())
    }

    /// Current status of the review request, if recorded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation`, `Error::Transaction` or
    /// `Error::Deserialize`.
    pub async fn read_status(&self, id: &ReviewRequestId) -> Result<Option<ReviewRequestStatus>> {
        let key = keys::review_status_key(id)?;
        self.load(&key).await
    }

    /// Remove the review request's status. Removing a missing record is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` or `Error::Transaction`.
    pub async fn delete_status(&self, id: &ReviewRequestId) -> Result<()> {
        let key = keys::review_status_key(id)?;
        let removed = self
            .store
            .delete(&key)
            .await
            .map_err(Error::transaction("delete review request status"))?;
        info!(key, removed, "deleted review request status");
        Ok(())
    }

    /// Fold `results` into the stored status and return the new record.
    ///
    /// A record for an older head commit is replaced rather than merged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation`, `Error::Transaction` or a serialization
    /// error. Nothing is written if the current record cannot be read.
    pub async fn merge_results(
        &self,
        request: &ReviewRequest,
        results: &[ProjectResult],
    ) -> Result<ReviewRequestStatus> {
        let key = keys::review_status_key(&request.id())?;
        let current = self.load(&key).await?;
        let replaced = current
            .as_ref()
            .is_some_and(|c| c.review_request.head_commit != request.head_commit);

        let status = merge::merge_results(current, request, results);
        self.save(&key, &status).await?;
        info!(
            key,
            head_commit = %request.head_commit,
            results = results.len(),
            projects = status.projects.len(),
            replaced,
            "merged project results"
        );
        Ok(status)
    }

    async fn load(&self, key: &str) -> Result<Option<ReviewRequestStatus>> {
        let bytes = self
            .store
            .get(key)
            .await
            .map_err(Error::transaction("get review request status"))?;
        bytes.map(|bytes| decode(STATUS, key, &bytes)).transpose()
    }

    async fn save(&self, key: &str, status: &ReviewRequestStatus) -> Result<()> {
        let bytes = encode(STATUS, status)?;
        self.store
            .set(key, bytes, None)
            .await
            .map_err(Error::transaction("write review request status"))
    }
}
