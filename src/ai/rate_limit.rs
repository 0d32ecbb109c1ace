//! Local Rate Limiter
//!
//! Per-provider-instance, per-model sliding counters over three windows:
//! requests per minute (rolling 60 s), tokens per minute (rolling 60 s),
//! and requests per day (reset at local midnight). Admission is an atomic
//! check-then-increment per model entry, so counters never exceed their
//! limit at the moment a request is admitted.
//!
//! This limiter proactively prevents exceeding vendor limits. It is
//! orthogonal to the quota tracker, which records that the vendor already
//! rejected for quota/billing reasons.

use chrono::{DateTime, Local, NaiveDate};
use dashmap::DashMap;

use crate::ai::clock::SharedClock;
use crate::ai::registry::RateLimits;
use crate::types::CompletionError;

/// Sliding counters for one provider instance x model
#[derive(Debug, Clone)]
struct UsageWindow {
    minute_start: DateTime<Local>,
    requests_this_minute: u32,
    tokens_this_minute: u32,
    day: NaiveDate,
    requests_today: u32,
}

impl UsageWindow {
    fn fresh(now: DateTime<Local>) -> Self {
        Self {
            minute_start: now,
            requests_this_minute: 0,
            tokens_this_minute: 0,
            day: now.date_naive(),
            requests_today: 0,
        }
    }

    /// Collapse expired windows in place
    fn roll(&mut self, now: DateTime<Local>) {
        if (now - self.minute_start).num_seconds() >= 60 {
            self.minute_start = now;
            self.requests_this_minute = 0;
            self.tokens_this_minute = 0;
        }
        if now.date_naive() != self.day {
            self.day = now.date_naive();
            self.requests_today = 0;
        }
    }
}

/// Cheap, conservative token estimate: ceil(chars / 4)
///
/// Deliberately not a real tokenizer. Overcounting slightly is fine; the
/// estimate only feeds the local tpm window.
pub fn estimate_tokens(prompt: &str, system_instruction: Option<&str>) -> u32 {
    let chars = prompt.len() + system_instruction.map_or(0, str::len);
    chars.div_ceil(4) as u32
}

/// Per-model admission counters for one provider instance
pub struct RateLimiter {
    windows: DashMap<String, UsageWindow>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Admit one call against the given limits, or reject naming the first
    /// violated constraint. On admission all three counters are bumped and
    /// the new daily count is returned for persistence.
    pub fn try_acquire(
        &self,
        model: &str,
        limits: RateLimits,
        token_estimate: u32,
    ) -> Result<u32, CompletionError> {
        let now = self.clock.now();
        let mut window = self
            .windows
            .entry(model.to_string())
            .or_insert_with(|| UsageWindow::fresh(now));

        window.roll(now);

        if window.requests_this_minute >= limits.rpm {
            return Err(CompletionError::rate_limited(format!(
                "requests-per-minute limit reached for {} ({}/min)",
                model, limits.rpm
            )));
        }
        if window.tokens_this_minute + token_estimate > limits.tpm {
            return Err(CompletionError::rate_limited(format!(
                "tokens-per-minute limit reached for {} ({}/min)",
                model, limits.tpm
            )));
        }
        if limits.rpd > 0 && window.requests_today >= limits.rpd {
            return Err(CompletionError::rate_limited(format!(
                "daily request limit reached for {} ({}/day)",
                model, limits.rpd
            )));
        }

        window.requests_this_minute += 1;
        window.tokens_this_minute += token_estimate;
        window.requests_today += 1;
        Ok(window.requests_today)
    }

    /// Seed the daily counter from a persisted usage record
    ///
    /// Only applied when the record's date is still today; stale records
    /// are ignored (the day window would reset them anyway).
    pub fn seed_day(&self, model: &str, date: NaiveDate, requests_today: u32) {
        let now = self.clock.now();
        if date != now.date_naive() {
            return;
        }
        let mut window = self
            .windows
            .entry(model.to_string())
            .or_insert_with(|| UsageWindow::fresh(now));
        window.requests_today = requests_today;
    }

    /// Current daily count for a model (0 if never used)
    pub fn day_count(&self, model: &str) -> u32 {
        self.windows.get(model).map_or(0, |w| w.requests_today)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("models", &self.windows.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::clock::{Clock, ManualClock};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn limits(rpm: u32, tpm: u32, rpd: u32) -> RateLimits {
        RateLimits { rpm, tpm, rpd }
    }

    fn midday_clock() -> Arc<ManualClock> {
        // Fixed mid-day start so minute tests never straddle midnight
        let start = Local.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        Arc::new(ManualClock::new(start))
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcd", None), 1);
        assert_eq!(estimate_tokens("abcde", None), 2);
        assert_eq!(estimate_tokens("abcd", Some("efgh")), 2);
        assert_eq!(estimate_tokens("", None), 0);
    }

    #[test]
    fn test_rpm_rejection_names_limit() {
        let clock = midday_clock();
        let limiter = RateLimiter::new(clock);
        let l = limits(2, 1_000_000, 0);

        assert!(limiter.try_acquire("m", l, 10).is_ok());
        assert!(limiter.try_acquire("m", l, 10).is_ok());
        let err = limiter.try_acquire("m", l, 10).unwrap_err();
        assert!(err.message.contains("requests-per-minute"));
    }

    #[test]
    fn test_tpm_rejection_names_limit() {
        let clock = midday_clock();
        let limiter = RateLimiter::new(clock);
        let l = limits(100, 100, 0);

        assert!(limiter.try_acquire("m", l, 60).is_ok());
        let err = limiter.try_acquire("m", l, 41).unwrap_err();
        assert!(err.message.contains("tokens-per-minute"));
        // Exactly filling the window is admitted
        assert!(limiter.try_acquire("m", l, 40).is_ok());
    }

    #[test]
    fn test_rpd_rejection_names_limit() {
        let clock = midday_clock();
        let limiter = RateLimiter::new(clock);
        let l = limits(100, 1_000_000, 1);

        assert!(limiter.try_acquire("m", l, 1).is_ok());
        let err = limiter.try_acquire("m", l, 1).unwrap_err();
        assert!(err.message.contains("daily request limit"));
    }

    #[test]
    fn test_minute_window_resets_once_per_boundary() {
        let clock = midday_clock();
        let limiter = RateLimiter::new(clock.clone());
        let l = limits(1, 1_000_000, 0);

        assert!(limiter.try_acquire("m", l, 1).is_ok());
        // Rapid repeated checks inside the same window all reject
        for _ in 0..5 {
            assert!(limiter.try_acquire("m", l, 1).is_err());
        }

        clock.advance(Duration::from_secs(60));
        assert!(limiter.try_acquire("m", l, 1).is_ok());
        assert!(limiter.try_acquire("m", l, 1).is_err());
    }

    #[test]
    fn test_day_window_resets_at_midnight() {
        let start = Local.with_ymd_and_hms(2026, 3, 14, 23, 59, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let limiter = RateLimiter::new(clock.clone());
        let l = limits(100, 1_000_000, 1);

        assert!(limiter.try_acquire("m", l, 1).is_ok());
        assert!(limiter.try_acquire("m", l, 1).is_err());

        clock.advance(Duration::from_secs(120));
        assert_ne!(clock.now().date_naive(), start.date_naive());
        assert!(limiter.try_acquire("m", l, 1).is_ok());
    }

    #[test]
    fn test_windows_are_per_model() {
        let clock = midday_clock();
        let limiter = RateLimiter::new(clock);
        let l = limits(1, 1_000_000, 0);

        assert!(limiter.try_acquire("m1", l, 1).is_ok());
        assert!(limiter.try_acquire("m1", l, 1).is_err());
        // A different model has its own window
        assert!(limiter.try_acquire("m2", l, 1).is_ok());
    }

    #[test]
    fn test_seed_day_same_date() {
        let clock = midday_clock();
        let today = clock.now().date_naive();
        let limiter = RateLimiter::new(clock);
        let l = limits(100, 1_000_000, 50);

        limiter.seed_day("m", today, 49);
        assert_eq!(limiter.day_count("m"), 49);
        assert!(limiter.try_acquire("m", l, 1).is_ok());
        assert!(limiter.try_acquire("m", l, 1).is_err());
    }

    #[test]
    fn test_seed_day_stale_date_ignored() {
        let clock = midday_clock();
        let yesterday = clock.now().date_naive().pred_opt().unwrap();
        let limiter = RateLimiter::new(clock);

        limiter.seed_day("m", yesterday, 49);
        assert_eq!(limiter.day_count("m"), 0);
    }

    proptest! {
        /// Admission is monotonic in headroom: a call is accepted exactly
        /// when its estimate still fits the tpm window.
        #[test]
        fn prop_tpm_admission(tpm in 1u32..10_000, estimates in proptest::collection::vec(0u32..2_000, 1..50)) {
            let clock = midday_clock();
            let limiter = RateLimiter::new(clock);
            let l = limits(u32::MAX, tpm, 0);

            let mut used = 0u32;
            for est in estimates {
                let admitted = limiter.try_acquire("m", l, est).is_ok();
                prop_assert_eq!(admitted, used + est <= tpm);
                if admitted {
                    used += est;
                }
            }
        }
    }
}
