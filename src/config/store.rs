//! Configuration Store (Figment-based)
//!
//! Loads the persisted provider selection by merging three layers:
//! 1. Built-in defaults (Serialized)
//! 2. Config file (~/.config/quizforge/config.toml)
//! 3. Environment variables (QUIZFORGE_* prefix)
//!
//! Writes always rewrite the whole file from the in-memory record, so a
//! partially-applied mutation can never be observed on disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::{debug, warn};

use super::types::{DailyUsage, StoredConfig};
use crate::ai::provider::UsageSink;
use crate::types::{QuizError, Result};

const CONFIG_FILE: &str = "config.toml";
const USAGE_FILE: &str = "usage.toml";

/// File-backed store for the provider selection and daily usage counter.
#[derive(Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store rooted at the default config directory
    pub fn new() -> Result<Self> {
        let dir = Self::default_dir().ok_or_else(|| {
            QuizError::Config("Cannot determine config directory".to_string())
        })?;
        Ok(Self { dir })
    }

    /// Store rooted at an explicit directory (tests, portable installs)
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve the config directory (~/.config/quizforge/)
    pub fn default_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("quizforge"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn usage_path(&self) -> PathBuf {
        self.dir.join(USAGE_FILE)
    }

    // =========================================================================
    // Provider Selection
    // =========================================================================

    /// Load the stored config: defaults → file → QUIZFORGE_ env vars
    pub fn load_config(&self) -> Result<StoredConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(StoredConfig::default()));

        let path = self.config_path();
        if path.exists() {
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }

        figment = figment.merge(Env::prefixed("QUIZFORGE_"));

        figment
            .extract()
            .map_err(|e| QuizError::Config(format!("Configuration error: {}", e)))
    }

    /// Rewrite the config file in full from the given record
    pub fn save_config(&self, config: &StoredConfig) -> Result<()> {
        let content =
            toml::to_string_pretty(config).map_err(|e| QuizError::Config(e.to_string()))?;
        self.write_file(&self.config_path(), &content)
    }

    // =========================================================================
    // Daily Usage
    // =========================================================================

    /// Load the persisted usage record, if any.
    ///
    /// An unreadable or unparseable record is treated as absent rather than
    /// fatal; the counter simply restarts from zero.
    pub fn load_usage(&self) -> Option<DailyUsage> {
        let path = self.usage_path();
        let content = fs::read_to_string(&path).ok()?;
        match toml::from_str(&content) {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!("Discarding unreadable usage record {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Rewrite the usage file in full
    pub fn save_usage(&self, usage: &DailyUsage) -> Result<()> {
        let content =
            toml::to_string_pretty(usage).map_err(|e| QuizError::Config(e.to_string()))?;
        self.write_file(&self.usage_path(), &content)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Persists the daily counter each time a request is admitted.
///
/// The sink is called from the rate limiter's admission path, which cannot
/// propagate storage errors; a failed write is logged and the counter is
/// reconstructed from the limiter on the next successful write.
pub struct PersistedUsageSink {
    store: ConfigStore,
}

impl PersistedUsageSink {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }
}

impl UsageSink for PersistedUsageSink {
    fn record(&self, date: chrono::NaiveDate, requests_today: u32) {
        let usage = DailyUsage::new(date, requests_today);
        if let Err(e) = self.store.save_usage(&usage) {
            warn!("Failed to persist usage record: {}", e);
        }
    }
}
