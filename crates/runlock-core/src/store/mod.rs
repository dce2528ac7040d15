//! Key-value store boundary.
//!
//! Everything runlock persists goes through [`KvStore`]. The trait mirrors
//! what a networked key-value server offers: point reads and writes with an
//! optional TTL, an atomic set-if-absent, deletes, and cursor-based key
//! enumeration filtered by a glob pattern.
//!
//! Implementations:
//! - [`memory::MemoryStore`] - process-local, for tests and embedding
//! - `runlock_kv::SledStore` - persistent, on-disk
//!
//! # Enumeration
//!
//! [`scan_keys`] turns the paged [`KvStore::scan`] into a lazy stream. The
//! stream walks a live keyspace: keys written or removed while it runs may or
//! may not be observed. Restart it by calling [`scan_keys`] again.

pub mod memory;

use std::{ops::Bound, time::Duration};

use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use globset::{GlobBuilder, GlobMatcher};

use crate::keys::KeyError;

/// Characters with special meaning in a key pattern.
const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}', '\\'];

/// Failure talking to the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("corrupt entry at key {key:?}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of [`KvStore::set_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetIfAbsent {
    /// The key was free and now holds the new value
    Stored,
    /// The key already held a value, returned here; nothing was written
    Occupied(Vec<u8>),
}

/// Position of a paged scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanCursor {
    #[default]
    Start,
    /// Resume strictly after this key
    After(String),
}

impl ScanCursor {
    /// Lower bound for an ordered keyspace walk over keys starting with `prefix`.
    #[must_use]
    pub fn lower_bound(&self, prefix: &str) -> Bound<String> {
        match self {
            Self::After(key) if key.as_str() >= prefix => Bound::Excluded(key.clone()),
            _ => Bound::Included(prefix.to_string()),
        }
    }
}

/// One page of a key scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanPage {
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` once the scan is complete
    pub next: Option<ScanCursor>,
}

/// Glob filter over keys.
///
/// Supports `*`, `?`, `[...]` and `{a,b}`. `*` crosses `/`, so `pr/*` matches
/// every key under `pr/`.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    glob: String,
    literal_prefix: String,
    matcher: GlobMatcher,
}

impl KeyPattern {
    /// Compile a glob pattern.
    pub fn new(glob: &str) -> Result<Self, KeyError> {
        let literal_prefix = glob.chars().take_while(|c| !GLOB_META.contains(c)).collect();
        Ok(Self {
            glob: glob.to_string(),
            literal_prefix,
            matcher: compile(glob)?,
        })
    }

    /// Pattern matching every key that starts with `prefix`, taken literally.
    pub fn prefix(prefix: &str) -> Result<Self, KeyError> {
        let escaped: String = prefix
            .chars()
            .flat_map(|c| {
                let escape = GLOB_META.contains(&c).then_some('\\');
                escape.into_iter().chain(std::iter::once(c))
            })
            .collect();
        let glob = format!("{escaped}*");
        Ok(Self {
            matcher: compile(&glob)?,
            glob,
            literal_prefix: prefix.to_string(),
        })
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// Literal text every matching key starts with.
    #[must_use]
    pub fn literal_prefix(&self) -> &str {
        &self.literal_prefix
    }
}

impl std::fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.glob)
    }
}

fn compile(glob: &str) -> Result<GlobMatcher, KeyError> {
    GlobBuilder::new(glob)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| KeyError::InvalidPattern {
            pattern: glob.to_string(),
            reason: e.kind().to_string(),
        })
}

/// Backing key-value store.
///
/// Implementations must make `set_if_absent` atomic: two concurrent calls for
/// the same free key must not both report [`SetIfAbsent::Stored`].
#[async_trait::async_trait]
pub trait KvStore: Send + Sync + std::fmt::Debug {
    /// Read a value. Expired values read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write a value only if the key is free, otherwise return what is there.
    async fn set_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StoreResult<SetIfAbsent>;

    /// Remove a key. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove a key only while it still holds `expected`. Returns whether it
    /// was removed. Must be atomic in the same way as `set_if_absent`.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool>;

    /// Return up to `count` keys matching `pattern`, in key order, starting at `cursor`.
    async fn scan(
        &self,
        cursor: ScanCursor,
        pattern: &KeyPattern,
        count: usize,
    ) -> StoreResult<ScanPage>;
}

/// Lazily stream every key matching `pattern`, fetching `page_size` keys per round trip.
pub fn scan_keys<'a>(
    store: &'a dyn KvStore,
    pattern: &'a KeyPattern,
    page_size: usize,
) -> BoxStream<'a, StoreResult<String>> {
    let page_size = page_size.max(1);
    futures::stream::try_unfold(Some(ScanCursor::Start), move |cursor| async move {
        let Some(cursor) = cursor else {
            return Ok(None);
        };
        let page = store.scan(cursor, pattern, page_size).await?;
        tracing::trace!(pattern = %pattern, keys = page.keys.len(), "scanned key page");
        Ok::<_, StoreError>(Some((page.keys, page.next)))
    })
    .map_ok(|keys| futures::stream::iter(keys.into_iter().map(Ok::<String, StoreError>)))
    .try_flatten()
    .boxed()
}
