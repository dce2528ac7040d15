//! Process-local [`KvStore`] backed by an ordered map.

use std::{
    collections::BTreeMap,
    ops::Bound,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;

use super::{KeyPattern, KvStore, ScanCursor, ScanPage, SetIfAbsent, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory store. Every operation takes the map lock, so `set_if_absent`
/// is atomic with respect to every other call on the same instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreResult<SetIfAbsent> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key).filter(|e| e.is_live(now)) {
            return Ok(SetIfAbsent::Occupied(existing.value.clone()));
        }
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(SetIfAbsent::Stored)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let unchanged = entries
            .get(key)
            .is_some_and(|e| e.is_live(now) && e.value == expected);
        if unchanged {
            entries.remove(key);
        }
        Ok(unchanged)
    }

    async fn scan(
        &self,
        cursor: ScanCursor,
        pattern: &KeyPattern,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let now = Instant::now();
        let prefix = pattern.literal_prefix();
        let entries = self.entries.read().await;

        let keys: Vec<String> = entries
            .range::<String, _>((cursor.lower_bound(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, entry)| entry.is_live(now) && pattern.matches(key))
            .map(|(key, _)| key.clone())
            .take(count.max(1))
            .collect();

        // A full page may have more behind it; a short page ends the scan.
        let next = if keys.len() == count.max(1) {
            keys.last().cloned().map(ScanCursor::After)
        } else {
            None
        };
        Ok(ScanPage { keys, next })
    }
}
