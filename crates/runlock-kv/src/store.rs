use std::{ops::Bound, path::Path, time::Duration};

use runlock_core::{KeyPattern, KvStore, ScanCursor, ScanPage, SetIfAbsent, StoreError, StoreResult};
use sled::{Db, IVec, Tree};
use tracing::debug;

use crate::{
    envelope::{self, Envelope},
    OpenError,
};

/// Name of the sled tree runlock keeps its records in.
pub const TREE_NAME: &str = "runlock";

/// [`KvStore`] on an embedded sled database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
    flush_on_write: bool,
}

impl SledStore {
    /// Open (or create) the database at `path`. A leading `~` is expanded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let raw = path.as_ref().to_string_lossy();
        let expanded = shellexpand::tilde(&raw);
        let path = Path::new(&*expanded);

        let open_err = |source: sled::Error| OpenError::Sled {
            path: path.to_path_buf(),
            source,
        };
        let db = sled::open(path).map_err(open_err)?;
        let tree = db.open_tree(TREE_NAME).map_err(open_err)?;
        debug!(path = %path.display(), "opened sled store");
        Ok(Self {
            db,
            tree,
            flush_on_write: true,
        })
    }

    /// A throwaway database removed when the last handle is dropped.
    pub fn temporary() -> Result<Self, OpenError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(OpenError::Temporary)?;
        let tree = db.open_tree(TREE_NAME).map_err(OpenError::Temporary)?;
        Ok(Self {
            db,
            tree,
            flush_on_write: false,
        })
    }

    /// Whether every write waits for the data to reach disk. On by default
    /// for [`SledStore::open`].
    #[must_use]
    pub const fn flush_on_write(mut self, flush: bool) -> Self {
        self.flush_on_write = flush;
        self
    }

    /// Write every pending change to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush().map(|_| ()).map_err(StoreError::backend)
    }

    fn after_write(&self) -> StoreResult<()> {
        if self.flush_on_write {
            self.flush()?;
        }
        Ok(())
    }

    /// Remove `key` if it still holds exactly `expired`.
    fn evict(&self, key: &str, expired: &IVec) -> StoreResult<()> {
        let swapped = self
            .tree
            .compare_and_swap(key, Some(expired), None::<IVec>)
            .map_err(StoreError::backend)?;
        if swapped.is_ok() {
            debug!(key, "removed expired entry");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvStore for SledStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let Some(raw) = self.tree.get(key).map_err(StoreError::backend)? else {
            return Ok(None);
        };
        let entry = Envelope::decode(key, &raw)?;
        if entry.is_live(envelope::now_ms()) {
            return Ok(Some(entry.value.to_vec()));
        }
        self.evict(key, &raw)?;
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        self.tree
            .insert(key, envelope::encode(&value, ttl))
            .map_err(StoreError::backend)?;
        self.after_write()
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreResult<SetIfAbsent> {
        let new = IVec::from(envelope::encode(&value, ttl));
        loop {
            let current = self.tree.get(key).map_err(StoreError::backend)?;
            if let Some(raw) = &current {
                let entry = Envelope::decode(key, raw)?;
                if entry.is_live(envelope::now_ms()) {
                    return Ok(SetIfAbsent::Occupied(entry.value.to_vec()));
                }
            }

            let swapped = self
                .tree
                .compare_and_swap(key, current.as_ref(), Some(new.clone()))
                .map_err(StoreError::backend)?;
            if swapped.is_ok() {
                self.after_write()?;
                return Ok(SetIfAbsent::Stored);
            }
            // another writer got in between the read and the swap
            debug!(key, "set-if-absent raced, retrying");
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed = self.tree.remove(key).map_err(StoreError::backend)?;
        self.after_write()?;
        let now = envelope::now_ms();
        Ok(removed.is_some_and(|raw| {
            Envelope::decode(key, &raw).map_or(true, |entry| entry.is_live(now))
        }))
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        loop {
            let Some(raw) = self.tree.get(key).map_err(StoreError::backend)? else {
                return Ok(false);
            };
            let entry = Envelope::decode(key, &raw)?;
            if !entry.is_live(envelope::now_ms()) || entry.value != expected {
                return Ok(false);
            }

            let swapped = self
                .tree
                .compare_and_swap(key, Some(&raw), None::<IVec>)
                .map_err(StoreError::backend)?;
            if swapped.is_ok() {
                self.after_write()?;
                return Ok(true);
            }
            debug!(key, "compare-and-delete raced, retrying");
        }
    }

    async fn scan(
        &self,
        cursor: ScanCursor,
        pattern: &KeyPattern,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let count = count.max(1);
        let prefix = pattern.literal_prefix();
        let now = envelope::now_ms();
        let mut keys = Vec::with_capacity(count);

        for item in self
            .tree
            .range::<String, _>((cursor.lower_bound(prefix), Bound::Unbounded))
        {
            let (raw_key, raw_value) = item.map_err(StoreError::backend)?;
            if !raw_key.starts_with(prefix.as_bytes()) {
                break;
            }
            let Ok(key) = std::str::from_utf8(&raw_key) else {
                continue;
            };
            if !pattern.matches(key) || !Envelope::decode(key, &raw_value)?.is_live(now) {
                continue;
            }
            keys.push(key.to_string());
            if keys.len() == count {
                break;
            }
        }

        let next = if keys.len() == count {
            keys.last().cloned().map(ScanCursor::After)
        } else {
            None
        };
        Ok(ScanPage { keys, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_is_exclusive() -> Result<(), Box<dyn std::error::Error>> {
        let store = SledStore::temporary()?;
        assert_eq!(
            store.set_if_absent("k", b"one".to_vec(), None).await?,
            SetIfAbsent::Stored
        );
        assert_eq!(
            store.set_if_absent("k", b"two".to_vec(), None).await?,
            SetIfAbsent::Occupied(b"one".to_vec())
        );
        Ok(())
    }

    #[tokio::test]
    async fn compare_and_delete_only_removes_expected_value() -> Result<(), Box<dyn std::error::Error>> {
        let store = SledStore::temporary()?;
        store.set("k", b"mine".to_vec(), None).await?;

        assert!(!store.compare_and_delete("k", b"theirs").await?);
        assert_eq!(store.get("k").await?, Some(b"mine".to_vec()));
        assert!(store.compare_and_delete("k", b"mine").await?);
        assert!(store.tree.get("k")?.is_none());
        assert!(!store.compare_and_delete("k", b"mine").await?);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_read() -> Result<(), Box<dyn std::error::Error>> {
        let store = SledStore::temporary()?;
        store
            .set("k", b"v".to_vec(), Some(Duration::from_millis(5)))
            .await?;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.get("k").await?, None);
        assert!(store.tree.get("k")?.is_none());
        assert!(!store.delete("k").await?);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_header_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let store = SledStore::temporary()?;
        store.tree.insert("pr/x", &b"abc"[..])?;
        assert!(matches!(
            store.get("pr/x").await,
            Err(StoreError::Corrupt { .. })
        ));
        Ok(())
    }
}
