//! Runlock-kv - persistent key-value store for runlock
//!
//! [`SledStore`] implements [`runlock_core::KvStore`] on an embedded sled
//! database, so locks and status records survive restarts and can be shared
//! by every process that opens the same directory in turn.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod envelope;
mod store;

use std::path::PathBuf;

pub use store::{SledStore, TREE_NAME};

/// Failure opening a sled database.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("failed to open store at {}: {source}", .path.display())]
    Sled {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    #[error("failed to open temporary store: {0}")]
    Temporary(#[source] sled::Error),
}
