//! CLI error type and exit codes

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the CLI outside the core library
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Open(#[from] runlock_kv::OpenError),

    #[error(transparent)]
    Core(#[from] runlock_core::Error),
}

impl Error {
    /// Process exit code.
    ///
    /// - 1: invalid input or configuration
    /// - 2: other failures
    /// - 3: lock conflict
    /// - 4: store or record failure
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) | Self::ConfigParse { .. } => 1,
            Self::ConfigRead { .. } => 2,
            Self::Open(_) => 4,
            Self::Core(e) => e.exit_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for any error that reaches `main`.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>()
        .map(Error::exit_code)
        .or_else(|| {
            err.downcast_ref::<runlock_core::Error>()
                .map(runlock_core::Error::exit_code)
        })
        .unwrap_or(2)
}
