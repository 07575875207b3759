//! `repokit.toml` and the database location the CLI works against

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use crate::storage::{ExecutorConfig, SharedExecutor, SqliteExecutor};
use crate::tables::SessionStore;

pub const CONFIG_FILE: &str = "repokit.toml";

/// Contents of `repokit.toml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RepokitConfig {
    pub database: Option<String>,
    pub foreign_keys: Option<bool>,
    pub busy_timeout_ms: Option<u64>,
}

impl RepokitConfig {
    /// Config written by `repokit init`: engine defaults spelled out
    pub fn for_database(db_path: &Path) -> Self {
        let defaults = ExecutorConfig::new(db_path);
        Self {
            database: Some(db_path.to_string_lossy().into_owned()),
            foreign_keys: Some(defaults.foreign_keys),
            busy_timeout_ms: Some(defaults.busy_timeout.as_millis() as u64),
        }
    }

    /// `None` when there is no file at `path`
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading repokit config {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("repokit config {} is not valid TOML for this version", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path, force: bool) -> anyhow::Result<()> {
        if path.exists() && !force {
            anyhow::bail!("repokit config already exists at {} (use --force to overwrite)", path.display());
        }

        let contents = toml::to_string_pretty(self).context("serializing repokit config")?;
        std::fs::write(path, contents).with_context(|| format!("writing repokit config {}", path.display()))
    }

    /// Database path from the config file, if set
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.as_ref().map(PathBuf::from)
    }

    /// Executor settings for `db_path`, with config overrides applied
    pub fn executor_config(&self, db_path: &Path) -> ExecutorConfig {
        let mut config = ExecutorConfig::new(db_path);
        if let Some(foreign_keys) = self.foreign_keys {
            config.foreign_keys = foreign_keys;
        }
        if let Some(ms) = self.busy_timeout_ms {
            config.busy_timeout = Duration::from_millis(ms);
        }
        config
    }
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".repokit").join("repokit.db")
}

/// Where the CLI reads its config and which database it opens.
///
/// The database is the `--database` flag if given, then the config file's
/// `database`, then `.repokit/repokit.db` under the working directory.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub config: RepokitConfig,
}

impl Settings {
    pub fn resolve(config_flag: Option<PathBuf>, db_flag: Option<PathBuf>, base: &Path) -> anyhow::Result<Self> {
        let config_path = config_flag.unwrap_or_else(|| base.join(CONFIG_FILE));
        let config = RepokitConfig::load(&config_path)?.unwrap_or_default();
        let db_path = db_flag
            .or_else(|| config.database_path())
            .unwrap_or_else(|| default_database_path_in(base));
        Ok(Self { config_path, db_path, config })
    }

    /// Settings for a config that does not exist yet
    pub fn fresh(config_flag: Option<PathBuf>, db_flag: Option<PathBuf>, base: &Path) -> Self {
        let config_path = config_flag.unwrap_or_else(|| base.join(CONFIG_FILE));
        let db_path = db_flag.unwrap_or_else(|| default_database_path_in(base));
        let config = RepokitConfig::for_database(&db_path);
        Self { config_path, db_path, config }
    }

    /// Open the database (creating its directory) with the session and
    /// counter tables in place
    pub fn open_store(&self) -> anyhow::Result<SessionStore> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let executor = SqliteExecutor::with_config(self.config.executor_config(&self.db_path))
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        let executor: SharedExecutor = Arc::new(executor);
        SessionStore::open(executor).with_context(|| format!("preparing session tables in {}", self.db_path.display()))
    }
}
