//! QuizForge - AI Content Generation for a Quiz RPG
//!
//! The provider-orchestration layer behind a desktop quiz game: one uniform
//! completion contract over a dozen vendor wire formats, with per-model
//! rate limiting, sticky quota blocking, vendor error classification, and
//! batched generation that yields a guaranteed-minimum question set despite
//! unreliable upstreams.
//!
//! ## Core Pieces
//!
//! - **Provider**: one adapter per vendor wire format (Gemini, OpenAI-style,
//!   Hugging Face, Cloudflare, Cohere, AI21, Clarifai) sharing retry and
//!   admission logic by composition
//! - **RateLimiter / QuotaTracker**: per-model sliding counters and a lazy
//!   TTL exhaustion flag
//! - **ErrorTaxonomy**: per-vendor tables turning raw error bodies into
//!   actionable messages and quota signals
//! - **AIService**: the facade the game calls; owns the active provider,
//!   the persisted selection, and the batched generation loop
//!
//! ## Quick Start
//!
//! ```ignore
//! use quizforge::AIService;
//!
//! let mut service = AIService::new()?;
//! service.set_provider("groq")?;
//! service.set_api_key("gsk-...")?;
//! let questions = service.generate_questions("roman history", 120, &[]).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: providers, registry, rate/quota accounting, taxonomy, service
//! - [`config`]: persisted provider selection and daily usage
//! - [`types`]: error types and the generated-content data model

pub mod ai;
pub mod config;
pub mod constants;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Errors
pub use types::{CompletionError, CompletionErrorKind, QuizError, Result};

// Generated content
pub use types::{CorrectAnswer, Enemy, KnowledgeNode, Question, QuestionKind};

// Configuration
pub use config::{ConfigStore, DailyUsage, StoredConfig};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    // Service
    AIService,
    // Clock
    Clock,
    CompletionOptions,
    // Providers
    Provider,
    ProviderDescriptor,
    QuotaTracker,
    // Accounting
    RateLimiter,
    SharedClock,
    SystemClock,
    build_provider,
    catalog,
};
