//! Resource and command lock manager.
//!
//! Resource locks give one review request exclusive use of a resource within
//! a workspace. Command locks disable a command type globally. Both are plain
//! records in the [`KvStore`]; the manager holds no state of its own, so any
//! number of clones can share one store.
//!
//! # Acquisition
//!
//! [`LockManager::try_lock`] goes through [`KvStore::set_if_absent`], so two
//! callers racing for the same free key cannot both win.
//!
//! # Release
//!
//! Releases delete through [`KvStore::compare_and_delete`] with the bytes
//! that were just read, so a lock taken over in the meantime survives.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    codec::{decode, encode},
    domain::{CommandLock, CommandName, Resource, ResourceLock},
    error::{Error, PartialError, PartialResult, Result},
    keys,
    store::{scan_keys, KeyPattern, KvStore, SetIfAbsent},
};

const RESOURCE_LOCK: &str = "resource lock";
const COMMAND_LOCK: &str = "command lock";

/// Default number of keys fetched per scan round trip.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 100;

/// Tuning for a [`LockManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Expiry applied to newly acquired resource locks; `None` keeps them until released
    pub ttl: Option<Duration>,
    /// Keys fetched per scan round trip, at least 1
    pub scan_page_size: usize,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }
}

/// Result of [`LockManager::try_lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    /// The candidate was stored and is now the holder
    Acquired(ResourceLock),
    /// Someone else holds the lock; this is their record
    Held(ResourceLock),
}

impl LockAttempt {
    #[must_use]
    pub const fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    /// The lock currently in force, whoever holds it
    #[must_use]
    pub const fn lock(&self) -> &ResourceLock {
        match self {
            Self::Acquired(lock) | Self::Held(lock) => lock,
        }
    }

    #[must_use]
    pub fn into_lock(self) -> ResourceLock {
        match self {
            Self::Acquired(lock) | Self::Held(lock) => lock,
        }
    }
}

/// Lock manager over a shared store.
#[derive(Debug, Clone)]
pub struct LockManager {
    store: Arc<dyn KvStore>,
    options: LockOptions,
}

impl LockManager {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_options(store, LockOptions::default())
    }

    #[must_use]
    pub fn with_options(store: Arc<dyn KvStore>, options: LockOptions) -> Self {
        Self { store, options }
    }

    #[must_use]
    pub const fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Try to take the lock described by `candidate`.
    ///
    /// Never waits: if the resource is already locked in that workspace the
    /// existing record is returned as [`LockAttempt::Held`] and nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transaction` if the store fails, or
    /// `Error::Deserialize` if the current holder's record is unreadable.
    pub async fn try_lock(&self, candidate: ResourceLock) -> Result<LockAttempt> {
        let key = keys::resource_lock_key(&candidate.resource, &candidate.workspace);
        let bytes = encode(RESOURCE_LOCK, &candidate)?;

        debug!(key, "acquiring resource lock");
        match self
            .store
            .set_if_absent(&key, bytes, self.options.ttl)
            .await
            .map_err(Error::transaction("acquire resource lock"))?
        {
            SetIfAbsent::Stored => {
                info!(
                    key,
                    review_request = candidate.review_request.number,
                    user = %candidate.user,
                    "acquired resource lock"
                );
                Ok(LockAttempt::Acquired(candidate))
            }
            SetIfAbsent::Occupied(existing) => {
                let holder: ResourceLock = decode(RESOURCE_LOCK, &key, &existing)?;
                warn!(
                    key,
                    holder = holder.review_request.number,
                    requested_by = candidate.review_request.number,
                    "resource already locked"
                );
                Ok(LockAttempt::Held(holder))
            }
        }
    }

    /// Release the lock on `resource` in `workspace`.
    ///
    /// Returns the removed record, or `None` if nothing was locked. The key
    /// is only deleted while it still holds the record that was read, so a
    /// lock taken over in between is left alone and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transaction` if the store fails, or
    /// `Error::Deserialize` if the stored record is unreadable. An unreadable
    /// record is left in place.
    pub async fn unlock(&self, resource: &Resource, workspace: &str) -> Result<Option<ResourceLock>> {
        let key = keys::resource_lock_key(resource, workspace);
        let Some((lock, bytes)) = self.fetch_lock(&key).await? else {
            debug!(key, "no resource lock to release");
            return Ok(None);
        };
        self.release(&key, lock, &bytes).await
    }

    /// Current lock on `resource` in `workspace`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transaction` or `Error::Deserialize`.
    pub async fn get_lock(&self, resource: &Resource, workspace: &str) -> Result<Option<ResourceLock>> {
        self.read_lock(&keys::resource_lock_key(resource, workspace))
            .await
    }

    /// Every resource lock currently held, in key order.
    ///
    /// # Errors
    ///
    /// Stops at the first store failure or unreadable record and returns the
    /// locks gathered so far in the `PartialError`.
    pub async fn list(&self) -> PartialResult<ResourceLock> {
        let pattern = keys::resource_lock_pattern()
            .map_err(|e| PartialError::new(Vec::new(), e.into()))?;
        self.scan_locks(&pattern).await
    }

    /// Release every lock the review request `number` holds in `repo_full_name`.
    ///
    /// Keys are visited in order and each lock is released as soon as it is
    /// read, so a failure part way through keeps the earlier releases.
    ///
    /// # Errors
    ///
    /// Stops at the first failure. The `PartialError` carries the locks that
    /// were released before it.
    pub async fn unlock_by_review_request(
        &self,
        repo_full_name: &str,
        number: u64,
    ) -> PartialResult<ResourceLock> {
        let pattern = keys::repo_lock_pattern(repo_full_name)
            .map_err(|e| PartialError::new(Vec::new(), e.into()))?;
        let mut stream = scan_keys(self.store.as_ref(), &pattern, self.options.scan_page_size);
        let mut released = Vec::new();

        while let Some(key) = stream.next().await {
            let step = match key {
                Ok(key) => self.release_if_held(&key, repo_full_name, number).await,
                Err(e) => Err(Error::transaction("scan resource locks")(e)),
            };
            match step {
                Ok(Some(lock)) => released.push(lock),
                Ok(None) => {}
                Err(source) => {
                    warn!(
                        repo = repo_full_name,
                        review_request = number,
                        released = released.len(),
                        error = %source,
                        "releasing review request locks stopped"
                    );
                    return Err(PartialError::new(released, source));
                }
            }
        }

        info!(
            repo = repo_full_name,
            review_request = number,
            released = released.len(),
            "released review request locks"
        );
        Ok(released)
    }

    /// Disable `command` globally, stamping the lock with `locked_at`.
    ///
    /// # Errors
    ///
    /// Returns `Error::CommandLockExists` if the command is already locked,
    /// or `Error::Transaction` if the store fails.
    pub async fn lock_command(
        &self,
        command: CommandName,
        locked_at: DateTime<Utc>,
    ) -> Result<CommandLock> {
        let key = keys::command_lock_key(command);
        let lock = CommandLock::new(command, locked_at);
        let bytes = encode(COMMAND_LOCK, &lock)?;

        match self
            .store
            .set_if_absent(&key, bytes, None)
            .await
            .map_err(Error::transaction("acquire command lock"))?
        {
            SetIfAbsent::Stored => {
                info!(%command, "locked command");
                Ok(lock)
            }
            SetIfAbsent::Occupied(_) => {
                warn!(%command, "command already locked");
                Err(Error::CommandLockExists { command })
            }
        }
    }

    /// Re-enable `command`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCommandLock` if the command is not locked, or
    /// `Error::Transaction` if the store fails.
    pub async fn unlock_command(&self, command: CommandName) -> Result<()> {
        let removed = self
            .store
            .delete(&keys::command_lock_key(command))
            .await
            .map_err(Error::transaction("release command lock"))?;
        if !removed {
            return Err(Error::NoCommandLock { command });
        }
        info!(%command, "unlocked command");
        Ok(())
    }

    /// Current lock on `command`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transaction` or `Error::Deserialize`.
    pub async fn check_command_lock(&self, command: CommandName) -> Result<Option<CommandLock>> {
        let key = keys::command_lock_key(command);
        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(Error::transaction("check command lock"))?;
        bytes
            .map(|bytes| decode(COMMAND_LOCK, &key, &bytes))
            .transpose()
    }

    async fn read_lock(&self, key: &str) -> Result<Option<ResourceLock>> {
        Ok(self.fetch_lock(key).await?.map(|(lock, _)| lock))
    }

    /// The decoded lock at `key` together with the bytes it was decoded from.
    async fn fetch_lock(&self, key: &str) -> Result<Option<(ResourceLock, Vec<u8>)>> {
        let Some(bytes) = self
            .store
            .get(key)
            .await
            .map_err(Error::transaction("get resource lock"))?
        else {
            return Ok(None);
        };
        let lock = decode(RESOURCE_LOCK, key, &bytes)?;
        Ok(Some((lock, bytes)))
    }

    async fn release_if_held(
        &self,
        key: &str,
        repo_full_name: &str,
        number: u64,
    ) -> Result<Option<ResourceLock>> {
        let Some((lock, bytes)) = self.fetch_lock(key).await? else {
            debug!(key, "lock disappeared during scan");
            return Ok(None);
        };
        if !lock.held_by(repo_full_name, number) {
            return Ok(None);
        }
        self.release(key, lock, &bytes).await
    }

    /// Delete `key` if it still holds `bytes`, the encoding of `lock`.
    async fn release(&self, key: &str, lock: ResourceLock, bytes: &[u8]) -> Result<Option<ResourceLock>> {
        let removed = self
            .store
            .compare_and_delete(key, bytes)
            .await
            .map_err(Error::transaction("release resource lock"))?;
        if !removed {
            debug!(key, "resource lock changed before release");
            return Ok(None);
        }

        info!(key, review_request = lock.review_request.number, "released resource lock");
        Ok(Some(lock))
    }

    async fn scan_locks(&self, pattern: &KeyPattern) -> PartialResult<ResourceLock> {
        let mut stream = scan_keys(self.store.as_ref(), pattern, self.options.scan_page_size);
        let mut locks = Vec::new();

        while let Some(key) = stream.next().await {
            let key = match key {
                Ok(key) => key,
                Err(e) => {
                    return Err(PartialError::new(
                        locks,
                        Error::transaction("scan resource locks")(e),
                    ))
                }
            };
            match self.read_lock(&key).await {
                Ok(Some(lock)) => locks.push(lock),
                Ok(None) => debug!(key, "lock disappeared during scan"),
                Err(source) => return Err(PartialError::new(locks, source)),
            }
        }

        debug!(pattern = %pattern, count = locks.len(), "scanned resource locks");
        Ok(locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Repository, ReviewRequest, VcsHostKind},
        store::memory::MemoryStore,
    };

    fn review_request(number: u64) -> ReviewRequest {
        ReviewRequest {
            number,
            head_commit: "abc123".into(),
            author: "dev".into(),
            url: String::new(),
            base_repo: Repository::new("org/repo", "github.com", VcsHostKind::Github),
        }
    }

    fn manager() -> LockManager {
        LockManager::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn second_lock_attempt_sees_first_holder() -> Result<()> {
        let locks = manager();
        let resource = Resource::new("org/repo", "prod");

        let first = locks
            .try_lock(ResourceLock::new(resource.clone(), "default", review_request(5), "alice"))
            .await?;
        let second = locks
            .try_lock(ResourceLock::new(resource, "default", review_request(7), "bob"))
            .await?;

        assert!(first.is_acquired());
        assert!(!second.is_acquired());
        assert_eq!(second.lock(), first.lock());
        assert_eq!(second.into_lock().review_request.number, 5);
        Ok(())
    }

    #[tokio::test]
    async fn same_resource_in_other_workspace_is_independent() -> Result<()> {
        let locks = manager();
        let resource = Resource::new("org/repo", "prod");

        let a = locks
            .try_lock(ResourceLock::new(resource.clone(), "default", review_request(5), "alice"))
            .await?;
        let b = locks
            .try_lock(ResourceLock::new(resource, "staging", review_request(7), "bob"))
            .await?;

        assert!(a.is_acquired());
        assert!(b.is_acquired());
        Ok(())
    }

    #[tokio::test]
    async fn unlock_without_lock_is_empty() -> Result<()> {
        let locks = manager();
        assert_eq!(locks.unlock(&Resource::new("org/repo", "prod"), "default").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn unlock_returns_removed_lock() -> Result<()> {
        let locks = manager();
        let resource = Resource::new("org/repo", "prod");
        let attempt = locks
            .try_lock(ResourceLock::new(resource.clone(), "default", review_request(5), "alice"))
            .await?;

        let removed = locks.unlock(&resource, "default").await?;
        assert_eq!(removed.as_ref(), Some(attempt.lock()));
        assert_eq!(locks.get_lock(&resource, "default").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn command_lock_lifecycle() -> Result<()> {
        let locks = manager();
        let at = Utc::now();

        assert_eq!(locks.check_command_lock(CommandName::Apply).await?, None);
        let lock = locks.lock_command(CommandName::Apply, at).await?;
        assert!(lock.is_locked());
        assert_eq!(lock.metadata.unix_time, at.timestamp());
        assert_eq!(
            locks.check_command_lock(CommandName::Apply).await?,
            Some(lock)
        );

        locks.unlock_command(CommandName::Apply).await?;
        assert_eq!(locks.check_command_lock(CommandName::Apply).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn command_lock_conflicts() -> Result<()> {
        let locks = manager();
        locks.lock_command(CommandName::Plan, Utc::now()).await?;

        let again = locks.lock_command(CommandName::Plan, Utc::now()).await;
        assert!(matches!(
            again,
            Err(Error::CommandLockExists {
                command: CommandName::Plan
            })
        ));

        let missing = locks.unlock_command(CommandName::Apply).await;
        assert!(matches!(
            missing,
            Err(Error::NoCommandLock {
                command: CommandName::Apply
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn command_locks_are_not_listed_as_resource_locks() -> Result<()> {
        let locks = manager();
        locks.lock_command(CommandName::Apply, Utc::now()).await?;
        let listed = locks.list().await.map_err(PartialError::into_source)?;
        assert!(listed.is_empty());
        Ok(())
    }
}
