//! Persisted Configuration Types
//!
//! The on-disk records the service reads at startup and rewrites whole on
//! every mutation: provider selection (`config.toml`) and the daily usage
//! counter (`usage.toml`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Provider selection record, persisted as a single TOML table.
///
/// Every setter on the service rewrites this record in full rather than
/// patching individual keys, so the file is always internally consistent.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoredConfig {
    /// Active provider id (e.g. "gemini", "groq"). Empty until first selection.
    pub provider_id: Option<String>,

    /// API key for the active provider
    pub api_key: Option<String>,

    /// Model override. When absent, the provider's default model is used.
    pub model: Option<String>,

    /// Account id, required by Cloudflare Workers AI only
    pub account_id: Option<String>,
}

impl StoredConfig {
    pub fn has_provider(&self) -> bool {
        self.provider_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

// Keys never appear in logs
impl std::fmt::Debug for StoredConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredConfig")
            .field("provider_id", &self.provider_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Daily request counter, persisted alongside the config.
///
/// A record whose `date` is not today is stale and ignored on load, which
/// resets the counter implicitly at local midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub requests_today: u32,
}

impl DailyUsage {
    pub fn new(date: NaiveDate, requests_today: u32) -> Self {
        Self {
            date,
            requests_today,
        }
    }
}
