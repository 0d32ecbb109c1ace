//! Quota Tracker
//!
//! Records that a vendor already rejected a provider for quota/billing
//! reasons and short-circuits further calls to the dead key. An armed
//! entry blocks all completions for that provider until the TTL expires
//! or the entry is explicitly reset.
//!
//! Expiry is lazy: entries are checked and deleted only on read, there is
//! no background timer.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::ai::clock::SharedClock;
use crate::constants::quota;

/// Per-provider exhaustion flags with lazy TTL expiry
pub struct QuotaTracker {
    exhausted: Mutex<HashMap<String, DateTime<Local>>>,
    clock: SharedClock,
}

impl QuotaTracker {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            exhausted: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Arm the flag for a provider, overwriting any prior timestamp
    pub fn set_exhausted(&self, provider_id: &str) {
        warn!(provider = provider_id, "Provider quota exhausted, blocking completions");
        let mut map = self.exhausted.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(provider_id.to_string(), self.clock.now());
    }

    /// Whether the provider is currently blocked
    ///
    /// An entry older than the TTL is deleted as a side effect of this read.
    pub fn is_exhausted(&self, provider_id: &str) -> bool {
        let mut map = self.exhausted.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match map.get(provider_id) {
            Some(armed_at) => {
                let age = (self.clock.now() - *armed_at).num_seconds();
                if age >= quota::EXHAUSTION_TTL_SECS {
                    map.remove(provider_id);
                    info!(provider = provider_id, "Quota block expired");
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Explicitly clear the flag (e.g. after the user swaps the API key)
    pub fn reset(&self, provider_id: &str) {
        let mut map = self.exhausted.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if map.remove(provider_id).is_some() {
            info!(provider = provider_id, "Quota block reset");
        }
    }
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.exhausted.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("QuotaTracker")
            .field("armed", &map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_set_then_is_exhausted() {
        let clock = Arc::new(ManualClock::from_system());
        let tracker = QuotaTracker::new(clock);

        assert!(!tracker.is_exhausted("gemini"));
        tracker.set_exhausted("gemini");
        assert!(tracker.is_exhausted("gemini"));
        // Other providers stay unaffected
        assert!(!tracker.is_exhausted("cohere"));
    }

    #[test]
    fn test_expiry_after_ttl_removes_entry() {
        let clock = Arc::new(ManualClock::from_system());
        let tracker = QuotaTracker::new(clock.clone());

        tracker.set_exhausted("gemini");
        clock.advance(Duration::from_secs(quota::EXHAUSTION_TTL_SECS as u64));
        assert!(!tracker.is_exhausted("gemini"));

        // Entry was deleted by the read above, not just masked
        let map = tracker.exhausted.lock().unwrap();
        assert!(!map.contains_key("gemini"));
    }

    #[test]
    fn test_still_armed_just_before_ttl() {
        let clock = Arc::new(ManualClock::from_system());
        let tracker = QuotaTracker::new(clock.clone());

        tracker.set_exhausted("gemini");
        clock.advance(Duration::from_secs((quota::EXHAUSTION_TTL_SECS as u64) - 1));
        assert!(tracker.is_exhausted("gemini"));
    }

    #[test]
    fn test_set_overwrites_timestamp() {
        let clock = Arc::new(ManualClock::from_system());
        let tracker = QuotaTracker::new(clock.clone());

        tracker.set_exhausted("gemini");
        clock.advance(Duration::from_secs(240));
        // Re-arming restarts the TTL
        tracker.set_exhausted("gemini");
        clock.advance(Duration::from_secs(240));
        assert!(tracker.is_exhausted("gemini"));
    }

    #[test]
    fn test_reset() {
        let clock = Arc::new(ManualClock::from_system());
        let tracker = QuotaTracker::new(clock);

        tracker.set_exhausted("gemini");
        tracker.reset("gemini");
        assert!(!tracker.is_exhausted("gemini"));
    }
}
