//! Command implementations
//!
//! Each command reads or changes the store through the core managers and
//! prints its result as text, or as pretty JSON with `--json`.

pub mod command_lock;
pub mod locks;
pub mod status;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use runlock_core::{KvStore, LockManager, StatusStore};
use runlock_kv::SledStore;
use serde::Serialize;

use crate::{
    cli::{Cli, Commands},
    config::{load_config, CliOverrides, Config},
    error::Error,
};

/// Managers shared by every command, plus output settings.
#[derive(Debug, Clone)]
pub struct Context {
    pub locks: LockManager,
    pub statuses: StatusStore,
    pub json: bool,
}

impl Context {
    /// Build a context over an already open store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, config: &Config, json: bool) -> Self {
        Self {
            locks: LockManager::with_options(store.clone(), config.lock_options()),
            statuses: StatusStore::new(store),
            json,
        }
    }

    /// Print `value` as pretty JSON, or as the text `render` produces.
    pub fn emit<T: Serialize + ?Sized>(&self, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
        let out = if self.json {
            serde_json::to_string_pretty(value).context("failed to encode output")?
        } else {
            render(value)
        };
        if !out.is_empty() {
            println!("{out}");
        }
        Ok(())
    }
}

/// Load configuration, open the store and run the parsed command.
///
/// # Errors
///
/// Returns the first configuration, store or command failure.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&CliOverrides {
        config_file: cli.config.clone(),
        db_path: cli.db_path.clone(),
    })
    .await?;

    let store = SledStore::open(&config.store.path)
        .map_err(Error::from)?
        .flush_on_write(config.store.flush_on_write);
    let ctx = Context::new(Arc::new(store), &config, cli.json);

    match cli.command {
        Commands::Locks { action } => locks::run(&ctx, action).await,
        Commands::Command { action } => command_lock::run(&ctx, action).await,
        Commands::Status { action } => status::run(&ctx, action).await,
    }
}
