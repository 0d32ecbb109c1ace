//! Provider Abstraction
//!
//! One uniform completion contract over heterogeneous vendor wire formats.
//! Variants differ only in wire translation - body shape, auth placement,
//! endpoint templating, response path - and vendor quirks. Rate limiting,
//! retry policy, and error classification are shared through
//! [`ProviderCore`] and the `http` helper by composition, not inheritance.
//!
//! API keys are handled securely: converted to `SecretString` on entry and
//! redacted in debug output.

mod ai21;
mod clarifai;
mod cloudflare;
mod cohere;
mod gemini;
mod http;
mod huggingface;
mod openai;

pub use ai21::Ai21Provider;
pub use clarifai::ClarifaiProvider;
pub use cloudflare::CloudflareProvider;
pub use cohere::CohereProvider;
pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;
pub use openai::OpenAiCompatProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::SecretString;

use crate::ai::clock::SharedClock;
use crate::ai::rate_limit::{RateLimiter, estimate_tokens};
use crate::ai::registry::{ModelDescriptor, ProviderDescriptor, WireFormat};
use crate::constants::{completion, network};
use crate::types::CompletionError;

// =============================================================================
// Completion Options
// =============================================================================

/// Per-call generation knobs; unset fields fall back to vendor defaults
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Generation cap (default 4096)
    pub max_tokens: Option<u32>,
    /// Sampling temperature (default 0.7)
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl CompletionOptions {
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(completion::DEFAULT_MAX_TOKENS)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(completion::DEFAULT_TEMPERATURE)
    }
}

// =============================================================================
// Usage Persistence Hook
// =============================================================================

/// Sink for the persisted daily request count
///
/// Called after every admitted call so the daily cap survives restarts.
/// The minute/token counters are deliberately not persisted.
pub trait UsageSink: Send + Sync {
    fn record(&self, date: NaiveDate, requests_today: u32);
}

// =============================================================================
// Provider Core (shared by composition)
// =============================================================================

/// State every wire-format variant carries: key, model, limiter, clock,
/// HTTP client, and the optional usage-persistence hook
pub struct ProviderCore {
    pub(crate) descriptor: &'static ProviderDescriptor,
    pub(crate) api_key: Option<SecretString>,
    pub(crate) model: String,
    pub(crate) account_id: Option<String>,
    pub(crate) client: reqwest::Client,
    pub(crate) limiter: RateLimiter,
    pub(crate) clock: SharedClock,
    pub(crate) usage: Option<Arc<dyn UsageSink>>,
}

impl ProviderCore {
    pub fn new(descriptor: &'static ProviderDescriptor, clock: SharedClock) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network::REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            descriptor,
            api_key: None,
            model: descriptor.default_model.to_string(),
            account_id: None,
            client,
            limiter: RateLimiter::new(clock.clone()),
            clock,
            usage: None,
        }
    }

    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(sink);
        self
    }

    /// The configured key, or a Configuration error before any network traffic
    pub(crate) fn require_key(&self) -> Result<&SecretString, CompletionError> {
        self.api_key.as_ref().ok_or_else(|| {
            CompletionError::configuration(format!(
                "no API key configured for {}",
                self.descriptor.id
            ))
            .provider(self.descriptor.id)
        })
    }

    /// Admission check then counter increment, strictly in that order and
    /// before the network call is sent. A call that later fails still
    /// consumed its slot, matching vendor-side accounting.
    pub(crate) fn admit(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<(), CompletionError> {
        let estimate = estimate_tokens(prompt, system_instruction);
        let limits = self.descriptor.limits_for(&self.model);
        let requests_today = self
            .limiter
            .try_acquire(&self.model, limits, estimate)
            .map_err(|e| e.provider(self.descriptor.id))?;
        if let Some(sink) = &self.usage {
            sink.record(self.clock.now().date_naive(), requests_today);
        }
        Ok(())
    }

    /// Seed the daily counter for the active model from a persisted record
    pub fn seed_day(&self, date: NaiveDate, requests_today: u32) {
        self.limiter.seed_day(&self.model, date, requests_today);
    }
}

impl std::fmt::Debug for ProviderCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCore")
            .field("provider", &self.descriptor.id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("account_id", &self.account_id)
            .finish()
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Uniform completion contract over one vendor wire format
///
/// The capability set (key/model setters, configuration check, model
/// catalog) has shared default implementations over [`ProviderCore`];
/// only `complete` is wire-specific.
#[async_trait]
pub trait Provider: Send + Sync {
    fn core(&self) -> &ProviderCore;
    fn core_mut(&mut self) -> &mut ProviderCore;

    fn descriptor(&self) -> &'static ProviderDescriptor {
        self.core().descriptor
    }

    fn id(&self) -> &'static str {
        self.descriptor().id
    }

    fn set_api_key(&mut self, key: SecretString) {
        self.core_mut().api_key = Some(key);
    }

    fn api_key(&self) -> Option<&SecretString> {
        self.core().api_key.as_ref()
    }

    fn set_model(&mut self, model: String) {
        self.core_mut().model = model;
    }

    fn model(&self) -> &str {
        &self.core().model
    }

    /// Extra account identifier some vendors require (endpoint templating)
    fn set_account_id(&mut self, account_id: Option<String>) {
        self.core_mut().account_id = account_id;
    }

    /// Ready to issue completions. Vendors with extra requirements
    /// (e.g. an account id) override this.
    fn is_configured(&self) -> bool {
        self.core().api_key.is_some()
    }

    fn available_models(&self) -> &[ModelDescriptor] {
        &self.descriptor().models
    }

    /// One completion round trip: returns generated text or a structured
    /// failure with the raw vendor message preserved
    async fn complete(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}

// =============================================================================
// Factory
// =============================================================================

/// Build a live provider from a catalog entry
pub fn build_provider(
    descriptor: &'static ProviderDescriptor,
    clock: SharedClock,
    usage: Option<Arc<dyn UsageSink>>,
) -> Box<dyn Provider> {
    let mut core = ProviderCore::new(descriptor, clock);
    if let Some(sink) = usage {
        core = core.with_usage_sink(sink);
    }
    match descriptor.wire_format {
        WireFormat::Gemini => Box::new(GeminiProvider::new(core)),
        WireFormat::OpenAiCompatible => Box::new(OpenAiCompatProvider::new(core)),
        WireFormat::HuggingFace => Box::new(HuggingFaceProvider::new(core)),
        WireFormat::Cloudflare => Box::new(CloudflareProvider::new(core)),
        WireFormat::Cohere => Box::new(CohereProvider::new(core)),
        WireFormat::Ai21 => Box::new(Ai21Provider::new(core)),
        WireFormat::Clarifai => Box::new(ClarifaiProvider::new(core)),
    }
}
