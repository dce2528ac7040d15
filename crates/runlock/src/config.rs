//! Configuration loading
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: `<config dir>/runlock/config.toml`
//! 3. File passed with `--config`
//! 4. Environment variables: `RUNLOCK_*`
//! 5. CLI flags
//!
//! # Example Config
//!
//! ```toml
//! [store]
//! path = "~/.local/share/runlock/db"
//! flush_on_write = true
//!
//! [locks]
//! ttl_secs = 0        # 0 disables expiry
//! scan_page_size = 100
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use runlock_core::LockOptions;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    pub store: StoreConfig,
    pub locks: LocksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database directory; `~` is expanded
    pub path: String,
    /// Wait for every write to reach disk
    pub flush_on_write: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocksConfig {
    /// Resource lock expiry in seconds, 0 for none
    pub ttl_secs: u64,
    /// Keys fetched per scan round trip
    pub scan_page_size: usize,
}

/// A config file as written: every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    store: StoreFile,
    #[serde(default)]
    locks: LocksFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreFile {
    path: Option<String>,
    flush_on_write: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocksFile {
    ttl_secs: Option<u64>,
    scan_page_size: Option<usize>,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            flush_on_write: true,
        }
    }
}

impl Default for LocksConfig {
    fn default() -> Self {
        let defaults = LockOptions::default();
        Self {
            ttl_secs: 0,
            scan_page_size: defaults.scan_page_size,
        }
    }
}

fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "runlock").map_or_else(
        || "~/.runlock/db".to_string(),
        |dirs| dirs.data_dir().join("db").display().to_string(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

/// Load configuration from all sources.
///
/// # Errors
///
/// Returns error if:
/// - A config file cannot be read, or the `--config` file does not exist
/// - A config file is malformed TOML
/// - An environment variable has an invalid value
/// - Config values fail validation
pub async fn load_config(overrides: &CliOverrides) -> Result<Config> {
    // 1. Built-in defaults
    let mut config = Config::default();

    // 2. Global config if it exists
    if let Some(global_path) = global_config_path() {
        if tokio::fs::try_exists(&global_path).await.unwrap_or(false) {
            config.merge(load_toml_file(&global_path).await?);
        }
    }

    // 3. Explicit config file, which must exist
    if let Some(path) = &overrides.config_file {
        config.merge(load_toml_file(path).await?);
    }

    // 4. Environment
    config.apply_env_vars()?;

    // 5. CLI flags
    if let Some(db_path) = &overrides.db_path {
        config.store.path = db_path.display().to_string();
    }

    config.validate()?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "runlock")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

async fn load_toml_file(path: &Path) -> Result<ConfigFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    std::env::var(name).ok().map_or(Ok(None), |value| {
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("Invalid {name} value {value:?}: {e}")))
    })
}

impl Config {
    fn merge(&mut self, file: ConfigFile) {
        if let Some(path) = file.store.path {
            self.store.path = path;
        }
        if let Some(flush) = file.store.flush_on_write {
            self.store.flush_on_write = flush;
        }
        if let Some(ttl) = file.locks.ttl_secs {
            self.locks.ttl_secs = ttl;
        }
        if let Some(size) = file.locks.scan_page_size {
            self.locks.scan_page_size = size;
        }
    }

    /// Apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    fn apply_env_vars(&mut self) -> Result<()> {
        if let Some(path) = env_var::<String>("RUNLOCK_DB_PATH")? {
            self.store.path = path;
        }
        if let Some(flush) = env_var("RUNLOCK_FLUSH_ON_WRITE")? {
            self.store.flush_on_write = flush;
        }
        if let Some(ttl) = env_var("RUNLOCK_LOCK_TTL_SECS")? {
            self.locks.ttl_secs = ttl;
        }
        if let Some(size) = env_var("RUNLOCK_SCAN_PAGE_SIZE")? {
            self.locks.scan_page_size = size;
        }
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any values are out of range or invalid
    fn validate(&self) -> Result<()> {
        if self.store.path.trim().is_empty() {
            return Err(Error::InvalidConfig("store.path must not be empty".into()));
        }
        if self.locks.scan_page_size == 0 {
            return Err(Error::InvalidConfig(
                "locks.scan_page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Lock manager options derived from `[locks]`.
    #[must_use]
    pub const fn lock_options(&self) -> LockOptions {
        LockOptions {
            ttl: match self.locks.ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            scan_page_size: self.locks.scan_page_size,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const ENV_VARS: [&str; 4] = [
        "RUNLOCK_DB_PATH",
        "RUNLOCK_FLUSH_ON_WRITE",
        "RUNLOCK_LOCK_TTL_SECS",
        "RUNLOCK_SCAN_PAGE_SIZE",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.store.flush_on_write);
        assert_eq!(config.lock_options(), LockOptions::default());
    }

    #[tokio::test]
    #[serial]
    async fn file_overrides_only_fields_it_sets() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[locks]\nttl_secs = 30\n");

        let config = load_config(&CliOverrides {
            config_file: Some(path),
            db_path: Some(dir.path().join("db")),
        })
        .await
        .unwrap();

        assert_eq!(config.locks.ttl_secs, 30);
        assert_eq!(config.locks.scan_page_size, 100);
        assert_eq!(config.lock_options().ttl, Some(Duration::from_secs(30)));
        assert_eq!(
            config.store.path,
            dir.path().join("db").display().to_string()
        );
    }

    #[tokio::test]
    #[serial]
    async fn env_overrides_file_and_cli_overrides_env() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[store]\npath = \"/from/file\"\n[locks]\nscan_page_size = 10\n");
        std::env::set_var("RUNLOCK_SCAN_PAGE_SIZE", "25");
        std::env::set_var("RUNLOCK_FLUSH_ON_WRITE", "false");
        std::env::set_var("RUNLOCK_DB_PATH", "/from/env");

        let from_env = load_config(&CliOverrides {
            config_file: Some(path.clone()),
            db_path: None,
        })
        .await
        .unwrap();
        let from_cli = load_config(&CliOverrides {
            config_file: Some(path),
            db_path: Some(PathBuf::from("/from/cli")),
        })
        .await
        .unwrap();
        clear_env();

        assert_eq!(from_env.locks.scan_page_size, 25);
        assert!(!from_env.store.flush_on_write);
        assert_eq!(from_env.store.path, "/from/env");
        assert_eq!(from_cli.store.path, "/from/cli");
    }

    #[tokio::test]
    #[serial]
    async fn invalid_env_value_is_rejected() {
        clear_env();
        std::env::set_var("RUNLOCK_LOCK_TTL_SECS", "soon");
        let result = load_config(&CliOverrides::default()).await;
        clear_env();

        assert!(matches!(result, Err(Error::InvalidConfig(msg)) if msg.contains("RUNLOCK_LOCK_TTL_SECS")));
    }

    #[tokio::test]
    #[serial]
    async fn zero_page_size_fails_validation() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[locks]\nscan_page_size = 0\n");

        let result = load_config(&CliOverrides {
            config_file: Some(path),
            db_path: None,
        })
        .await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    #[serial]
    async fn unknown_keys_and_missing_file_are_errors() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[store]\ncolour = \"blue\"\n");

        let unknown = load_config(&CliOverrides {
            config_file: Some(path),
            db_path: None,
        })
        .await;
        assert!(matches!(unknown, Err(Error::ConfigParse { .. })));

        let missing = load_config(&CliOverrides {
            config_file: Some(dir.path().join("absent.toml")),
            db_path: None,
        })
        .await;
        assert!(matches!(missing, Err(Error::ConfigRead { .. })));
    }
}
