//! Error types for runlock-core
//!
//! Four categories, so callers can tell an expected conflict from an
//! infrastructure problem:
//!
//! - **Transaction**: the backing store failed (exit code 4)
//! - **Deserialize / Serialize**: a stored record has the wrong shape (exit code 4)
//! - **Validation**: a key could not be derived from the input (exit code 1)
//! - **Conflict**: a command lock was already held, or was not held (exit code 3)
//!
//! A missing record is never an error; operations return `None` instead.

use std::fmt;

use thiserror::Error;

use crate::{domain::CommandName, keys::KeyError, store::StoreError};

/// Core error type for runlock operations
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store failed while running `operation`
    #[error("db transaction failed: {operation}: {source}")]
    Transaction {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// A stored value did not parse as the expected record
    #[error("failed to deserialize {record} at key '{key}': {source}")]
    Deserialize {
        record: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded
    #[error("failed to serialize {record}: {source}")]
    Serialize {
        record: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Input rejected before touching the store
    #[error(transparent)]
    Validation(#[from] KeyError),

    /// A lock for this command is already held
    #[error("db transaction failed: lock already exists for command '{command}'")]
    CommandLockExists { command: CommandName },

    /// Unlock requested for a command that is not locked
    #[error("db transaction failed: no lock exists for command '{command}'")]
    NoCommandLock { command: CommandName },
}

impl Error {
    /// Wrap a store failure with the name of the operation that hit it.
    pub(crate) fn transaction(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Transaction { operation, source }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transaction { .. } => "TRANSACTION_FAILED",
            Self::Deserialize { .. } => "DESERIALIZE_FAILED",
            Self::Serialize { .. } => "SERIALIZE_FAILED",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::CommandLockExists { .. } => "LOCK_EXISTS",
            Self::NoCommandLock { .. } => "NO_LOCK",
        }
    }

    /// Whether this is an expected lock conflict rather than a failure
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::CommandLockExists { .. } | Self::NoCommandLock { .. }
        )
    }

    /// Process exit code for this error.
    ///
    /// - 1: validation
    /// - 3: lock conflict
    /// - 4: store or record failure
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 1,
            Self::CommandLockExists { .. } | Self::NoCommandLock { .. } => 3,
            Self::Transaction { .. } | Self::Deserialize { .. } | Self::Serialize { .. } => 4,
        }
    }
}

/// Result type alias for runlock-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// An enumeration that stopped early, with everything gathered before the failure.
#[derive(Debug, Error)]
#[error("{source} ({} entries processed before the failure)", .partial.len())]
pub struct PartialError<T: fmt::Debug> {
    pub partial: Vec<T>,
    #[source]
    pub source: Error,
}

impl<T: fmt::Debug> PartialError<T> {
    pub const fn new(partial: Vec<T>, source: Error) -> Self {
        Self { partial, source }
    }

    /// Drop the partial results and keep the error.
    pub fn into_source(self) -> Error {
        self.source
    }
}

/// Result of an enumeration that may fail part-way
pub type PartialResult<T> = std::result::Result<Vec<T>, PartialError<T>>;
