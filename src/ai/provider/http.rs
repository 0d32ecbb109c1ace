//! Shared HTTP Execution with Uniform Retry Policy
//!
//! Every wire-format variant funnels its single POST through here. The
//! retry policy is identical across variants, tuned per failure class:
//!
//! | Failure            | Max retries | Backoff                              |
//! |--------------------|-------------|--------------------------------------|
//! | HTTP 429           | 3           | vendor retry-after hint, else 10s*2^n |
//! | HTTP 503           | 3           | 15s*1.5^n                            |
//! | Transport failure  | 3           | fixed 5s                             |
//! | Other HTTP status  | 0           | surfaced immediately                 |
//!
//! After retries are exhausted the raw vendor body is preserved unmodified
//! so the taxonomy can still pattern-match it.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::retry;
use crate::types::{CompletionError, CompletionErrorKind};

use super::ProviderCore;

/// POST one vendor request, retrying per the uniform policy, returning
/// the parsed JSON response body
///
/// Auth rides in `headers` unless the vendor wants it in the URL (Gemini).
pub(crate) async fn execute<B: serde::Serialize + Sync>(
    core: &ProviderCore,
    url: &str,
    headers: &[(&'static str, String)],
    body: &B,
) -> Result<Value, CompletionError> {
    let provider_id = core.descriptor.id;
    let mut rate_limit_attempts = 0u32;
    let mut transient_attempts = 0u32;
    let mut network_attempts = 0u32;

    loop {
        let mut request = core.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                if network_attempts >= retry::NETWORK_MAX_RETRIES {
                    return Err(CompletionError::new(
                        CompletionErrorKind::Network,
                        e.to_string(),
                    )
                    .provider(provider_id));
                }
                network_attempts += 1;
                warn!(
                    provider = provider_id,
                    attempt = network_attempts,
                    error = %e,
                    "Transport failure, retrying"
                );
                core.clock
                    .sleep(Duration::from_secs(retry::NETWORK_DELAY_SECS))
                    .await;
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| {
                CompletionError::new(
                    CompletionErrorKind::UpstreamTransient,
                    format!("malformed response body: {}", e),
                )
                .provider(provider_id)
                .status(status.as_u16())
            });
        }

        // Read the hint header before the body consumes the response
        let header_hint = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();

        match status_action(status.as_u16(), rate_limit_attempts, transient_attempts) {
            StatusAction::RetryRateLimited => {
                let delay = rate_limit_delay(rate_limit_attempts, header_hint, &body);
                rate_limit_attempts += 1;
                debug!(
                    provider = provider_id,
                    attempt = rate_limit_attempts,
                    delay_secs = delay.as_secs(),
                    "Vendor rate limited, backing off"
                );
                core.clock.sleep(with_jitter(delay)).await;
            }
            StatusAction::RetryTransient => {
                let delay = transient_delay(transient_attempts);
                transient_attempts += 1;
                debug!(
                    provider = provider_id,
                    attempt = transient_attempts,
                    delay_secs = delay.as_secs(),
                    "Upstream unavailable, backing off"
                );
                core.clock.sleep(with_jitter(delay)).await;
            }
            StatusAction::Surface(kind) => {
                // Classification happens at the taxonomy layer with the
                // raw body intact
                let mut err = CompletionError::new(kind, body)
                    .provider(provider_id)
                    .status(status.as_u16());
                if let Some(hint) = header_hint {
                    err = err.retry_after(hint);
                }
                return Err(err);
            }
        }
    }
}

/// What the retry loop does with a non-success status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusAction {
    /// Back off per the rate-limit schedule and retry
    RetryRateLimited,
    /// Back off per the transient schedule and retry
    RetryTransient,
    /// Give up now with this error kind
    Surface(CompletionErrorKind),
}

/// Status dispatch: 429 and cold-start 503 each get a retry budget,
/// everything else is surfaced immediately
fn status_action(status: u16, rate_limit_attempts: u32, transient_attempts: u32) -> StatusAction {
    match status {
        429 if rate_limit_attempts < retry::RATE_LIMIT_MAX_RETRIES => {
            StatusAction::RetryRateLimited
        }
        429 => StatusAction::Surface(CompletionErrorKind::UpstreamRateLimited),
        503 if transient_attempts < retry::TRANSIENT_MAX_RETRIES => StatusAction::RetryTransient,
        503 => StatusAction::Surface(CompletionErrorKind::UpstreamTransient),
        500..=599 => StatusAction::Surface(CompletionErrorKind::UpstreamTransient),
        _ => StatusAction::Surface(CompletionErrorKind::UpstreamPermanent),
    }
}

/// Backoff before the next 429 retry: vendor hint (header, then body text),
/// else 10s doubled per attempt
fn rate_limit_delay(attempt: u32, header_hint: Option<Duration>, body: &str) -> Duration {
    let cap = Duration::from_secs(retry::MAX_HINT_DELAY_SECS);
    header_hint
        .or_else(|| parse_retry_hint(body))
        .map(|hint| hint.min(cap))
        .unwrap_or_else(|| {
            Duration::from_secs(retry::RATE_LIMIT_BASE_DELAY_SECS * 2u64.pow(attempt))
        })
}

/// Backoff before the next 503 retry: 15s grown by 1.5 per attempt
fn transient_delay(attempt: u32) -> Duration {
    let secs = retry::TRANSIENT_BASE_DELAY_SECS as f32
        * retry::TRANSIENT_BACKOFF_FACTOR.powi(attempt as i32);
    Duration::from_secs_f32(secs)
}

/// Extract a retry-after hint from free-form vendor error text
///
/// Matches "retry after N", "retry-after: N", and "wait/in N
/// second(s)/minute(s)". The bare "wait"/"in" forms require the time unit
/// so incidental numbers ("logged in 30 places") are not taken as hints.
/// Capped at 5 minutes.
fn parse_retry_hint(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();

    if let Some(idx) = lower.find("retry") {
        for word in lower[idx..].split_whitespace() {
            if let Ok(secs) = word.trim_matches(|c: char| !c.is_ascii_digit()).parse::<u64>() {
                return Some(Duration::from_secs(secs.min(retry::MAX_HINT_DELAY_SECS)));
            }
        }
    }

    for pattern in &["wait ", "in "] {
        let Some(idx) = lower.find(pattern) else {
            continue;
        };
        let mut words = lower[idx + pattern.len()..].split_whitespace();
        let Some(number) = words.next().and_then(|w| w.parse::<u64>().ok()) else {
            continue;
        };
        let secs = match words.next() {
            Some(unit) if unit.starts_with("sec") => number,
            Some(unit) if unit.starts_with("min") => number.saturating_mul(60),
            _ => continue,
        };
        return Some(Duration::from_secs(secs.min(retry::MAX_HINT_DELAY_SECS)));
    }

    None
}

/// Add up to a quarter of random jitter so synchronized retries spread out
fn with_jitter(base: Duration) -> Duration {
    let max_jitter_ms = (base.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}
