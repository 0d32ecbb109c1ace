//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Batched generation constants
pub mod batch {
    /// Items requested per batch (one call's practical output limit)
    pub const BATCH_SIZE: usize = 30;

    /// Maximum batches per generation run
    pub const MAX_BATCHES: usize = 4;

    /// Attempts per batch before the batch is dropped
    pub const MAX_RETRIES: usize = 3;

    /// Delay between attempts within a batch (seconds)
    pub const RETRY_DELAY_SECS: u64 = 15;

    /// Pacing delay between batches (seconds)
    pub const BATCH_DELAY_SECS: u64 = 3;

    /// Requested counts are clamped up to this floor, never reduced
    pub const MIN_REQUEST_FLOOR: usize = 120;
}

/// HTTP retry policy constants, per failure class
pub mod retry {
    /// Retries for vendor 429 responses
    pub const RATE_LIMIT_MAX_RETRIES: u32 = 3;

    /// Base backoff for 429 when the vendor gives no retry-after hint (seconds),
    /// doubled per attempt
    pub const RATE_LIMIT_BASE_DELAY_SECS: u64 = 10;

    /// Retries for 503 / cold-start responses
    pub const TRANSIENT_MAX_RETRIES: u32 = 3;

    /// Base backoff for 503 (seconds), grown by TRANSIENT_BACKOFF_FACTOR per attempt
    pub const TRANSIENT_BASE_DELAY_SECS: u64 = 15;

    /// Backoff multiplier for the transient class
    pub const TRANSIENT_BACKOFF_FACTOR: f32 = 1.5;

    /// Retries for transport failures
    pub const NETWORK_MAX_RETRIES: u32 = 3;

    /// Fixed delay between transport retries (seconds)
    pub const NETWORK_DELAY_SECS: u64 = 5;

    /// Cap on any vendor retry-after hint (seconds)
    pub const MAX_HINT_DELAY_SECS: u64 = 300;
}

/// Rate limiter fallbacks when the catalog carries no vendor default
pub mod limits {
    /// Requests per minute
    pub const DEFAULT_RPM: u32 = 10;

    /// Tokens per minute
    pub const DEFAULT_TPM: u32 = 32_000;

    /// Requests per day (0 = unlimited)
    pub const DEFAULT_RPD: u32 = 0;
}

/// Quota tracker constants
pub mod quota {
    /// How long a vendor quota signal blocks a provider (seconds)
    pub const EXHAUSTION_TTL_SECS: i64 = 300;
}

/// Network constants
pub mod network {
    /// Per-request HTTP timeout (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
}

/// Completion defaults applied when the caller passes no override
pub mod completion {
    /// Generation cap
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;

    /// Sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
}
