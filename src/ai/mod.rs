//! AI Orchestration Layer
//!
//! Provider abstraction over vendor wire formats, rate/quota accounting,
//! error taxonomy, and the batched generation service.

pub mod clock;
pub mod extraction;
pub mod provider;
pub mod quota;
pub mod rate_limit;
pub mod registry;
pub mod service;
pub mod taxonomy;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use extraction::extract_json;
pub use provider::{
    Ai21Provider, ClarifaiProvider, CloudflareProvider, CohereProvider, CompletionOptions,
    GeminiProvider, HuggingFaceProvider, OpenAiCompatProvider, Provider, ProviderCore,
    UsageSink, build_provider,
};
pub use quota::QuotaTracker;
pub use rate_limit::{RateLimiter, estimate_tokens};
pub use registry::{ModelDescriptor, ProviderDescriptor, RateLimits, WireFormat, catalog, find};
pub use service::AIService;
