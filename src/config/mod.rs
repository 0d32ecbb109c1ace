//! Configuration Module
//!
//! Persisted provider selection and daily usage, stored as TOML under the
//! user config directory and loaded through Figment.

pub mod store;
pub mod types;

pub use store::{ConfigStore, PersistedUsageSink};
pub use types::{DailyUsage, StoredConfig};
