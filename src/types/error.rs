//! Unified Error Type System
//!
//! Centralized error types for the orchestration layer.
//! Completion failures carry a kind used for retry and abort decisions.
//!
//! ## Completion Error Kinds
//!
//! - **Configuration**: Missing key/model (fail fast, never retried)
//! - **RateLimited**: Local admission denial by the rate limiter
//! - **UpstreamRateLimited**: Vendor 429 (retried with backoff, then surfaced)
//! - **UpstreamTransient**: Vendor 5xx/cold-start (retried, then surfaced)
//! - **UpstreamPermanent**: Other vendor 4xx (surfaced immediately)
//! - **Network**: Transport failure (retried, then surfaced)
//! - **Parse**: Missing/invalid JSON in model output (charged to the batch budget)
//! - **QuotaExhausted**: Vendor billing/quota signal (aborts the run, arms the block)
//!
//! ## Design Principles
//!
//! - Single unified error type (QuizError) for the crate
//! - Structured completion errors with the raw vendor text preserved
//! - No panic/unwrap - all errors are recoverable

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Completion Error Kinds
// =============================================================================

/// Failure classes for a single completion round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Missing API key or model - fail fast, don't retry
    Configuration,
    /// Local rate limiter rejected the call before any network traffic
    RateLimited,
    /// Vendor returned 429 - retried per policy, then surfaced
    UpstreamRateLimited,
    /// Vendor returned 5xx or a cold-start signal - retried, then surfaced
    UpstreamTransient,
    /// Vendor returned another 4xx - surfaced immediately, classified
    UpstreamPermanent,
    /// Transport failure - retried with fixed delay, then surfaced
    Network,
    /// Model output contained no parseable JSON
    Parse,
    /// Vendor quota/billing signal - terminal for the run, sticky per provider
    QuotaExhausted,
}

impl std::fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::UpstreamRateLimited => write!(f, "UPSTREAM_RATE_LIMITED"),
            Self::UpstreamTransient => write!(f, "UPSTREAM_TRANSIENT"),
            Self::UpstreamPermanent => write!(f, "UPSTREAM_PERMANENT"),
            Self::Network => write!(f, "NETWORK"),
            Self::Parse => write!(f, "PARSE"),
            Self::QuotaExhausted => write!(f, "QUOTA_EXHAUSTED"),
        }
    }
}

impl CompletionErrorKind {
    /// Whether the HTTP layer retries this class before surfacing it
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimited | Self::UpstreamTransient | Self::Network
        )
    }

    /// Whether this failure ends the whole generation run, not just one attempt
    pub fn is_terminal_for_run(&self) -> bool {
        matches!(self, Self::Configuration | Self::QuotaExhausted)
    }
}

// =============================================================================
// Completion Error
// =============================================================================

/// Structured failure of one completion attempt
///
/// The raw vendor text is preserved unmodified in `message` so the error
/// taxonomy can still pattern-match it after retries are exhausted.
#[derive(Debug, Clone)]
pub struct CompletionError {
    /// Failure class for retry/abort decisions
    pub kind: CompletionErrorKind,
    /// Raw vendor message or transport error text
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// HTTP status, when the vendor answered at all
    pub status: Option<u16>,
    /// Vendor-suggested wait before retry (retry-after hint)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.kind, self.message)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for CompletionError {}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            status: None,
            retry_after: None,
        }
    }

    /// Attach provider context
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach the HTTP status the vendor answered with
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a vendor retry-after hint
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Missing key/model before any network traffic
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Configuration, message)
    }

    /// Local admission denial naming the violated limit
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::RateLimited, message)
    }

    /// Model output without parseable JSON
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Parse, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum QuizError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Completion Errors
    // -------------------------------------------------------------------------
    /// Structured completion failure with kind and raw vendor text
    #[error("Completion error: {0}")]
    Completion(CompletionError),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No provider configured")]
    NoProvider,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl From<CompletionError> for QuizError {
    fn from(err: CompletionError) -> Self {
        QuizError::Completion(err)
    }
}

impl From<anyhow::Error> for QuizError {
    fn from(err: anyhow::Error) -> Self {
        // Most anyhow usage sits at the storage boundary
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return QuizError::Io(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }
        QuizError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;

impl QuizError {
    /// The completion kind, when this error came out of a completion attempt
    pub fn completion_kind(&self) -> Option<CompletionErrorKind> {
        match self {
            Self::Completion(e) => Some(e.kind),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(
            CompletionErrorKind::UpstreamRateLimited.to_string(),
            "UPSTREAM_RATE_LIMITED"
        );
        assert_eq!(CompletionErrorKind::Parse.to_string(), "PARSE");
    }

    #[test]
    fn test_kind_retryable() {
        assert!(CompletionErrorKind::UpstreamRateLimited.is_retryable());
        assert!(CompletionErrorKind::UpstreamTransient.is_retryable());
        assert!(CompletionErrorKind::Network.is_retryable());
        assert!(!CompletionErrorKind::Configuration.is_retryable());
        assert!(!CompletionErrorKind::UpstreamPermanent.is_retryable());
        assert!(!CompletionErrorKind::QuotaExhausted.is_retryable());
    }

    #[test]
    fn test_kind_terminal() {
        assert!(CompletionErrorKind::QuotaExhausted.is_terminal_for_run());
        assert!(CompletionErrorKind::Configuration.is_terminal_for_run());
        assert!(!CompletionErrorKind::Network.is_terminal_for_run());
    }

    #[test]
    fn test_completion_error_display() {
        let err = CompletionError::new(CompletionErrorKind::UpstreamRateLimited, "too many")
            .provider("gemini")
            .status(429);
        assert_eq!(err.to_string(), "[gemini:UPSTREAM_RATE_LIMITED] too many");
        assert_eq!(err.status, Some(429));

        let bare = CompletionError::parse("no json found");
        assert_eq!(bare.to_string(), "[PARSE] no json found");
    }

    #[test]
    fn test_raw_message_preserved() {
        let raw = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED"}}"#;
        let err = CompletionError::new(CompletionErrorKind::UpstreamRateLimited, raw);
        assert_eq!(err.message, raw);
    }

    #[test]
    fn test_completion_kind_accessor() {
        let err: QuizError = CompletionError::rate_limited("rpm reached").into();
        assert_eq!(err.completion_kind(), Some(CompletionErrorKind::RateLimited));
        assert_eq!(QuizError::NoProvider.completion_kind(), None);
    }
}
