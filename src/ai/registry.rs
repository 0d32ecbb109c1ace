//! Provider Registry
//!
//! Static catalog of vendor metadata: endpoints, models, regions, and
//! default rate limits. Loaded once; descriptors are immutable. The
//! factory builds a live provider from a catalog entry plus runtime
//! config.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::constants::limits;

/// Wire protocol a provider speaks
///
/// Several catalog entries can share one wire format (the OpenAI-compatible
/// shape in particular is served by many hosts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    Gemini,
    OpenAiCompatible,
    HuggingFace,
    Cloudflare,
    Cohere,
    Ai21,
    Clarifai,
}

/// Request/token ceilings for one rate window set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Requests per minute
    pub rpm: u32,
    /// Tokens per minute
    pub tpm: u32,
    /// Requests per day, 0 = unlimited
    pub rpd: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            rpm: limits::DEFAULT_RPM,
            tpm: limits::DEFAULT_TPM,
            rpd: limits::DEFAULT_RPD,
        }
    }
}

/// One model a vendor serves
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Model-specific limit override; None falls back to the provider default
    pub limits: Option<RateLimits>,
}

/// Immutable vendor catalog entry
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub wire_format: WireFormat,
    pub base_url: &'static str,
    pub models: Vec<ModelDescriptor>,
    pub default_model: &'static str,
    /// Hosting region hint shown in provider pickers
    pub region: &'static str,
    /// Whether the endpoint is typically unreachable without a proxy
    pub requires_proxy: bool,
    pub default_limits: RateLimits,
}

impl ProviderDescriptor {
    /// Resolve the effective limits for a model:
    /// model override -> provider default (catalog fallback is baked into both)
    pub fn limits_for(&self, model: &str) -> RateLimits {
        self.models
            .iter()
            .find(|m| m.id == model)
            .and_then(|m| m.limits)
            .unwrap_or(self.default_limits)
    }

    pub fn model(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }
}

fn model(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    limits: Option<RateLimits>,
) -> ModelDescriptor {
    ModelDescriptor {
        id,
        name,
        description,
        limits,
    }
}

/// The full vendor catalog, built once
pub fn catalog() -> &'static [ProviderDescriptor] {
    static CATALOG: OnceLock<Vec<ProviderDescriptor>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Look up a catalog entry by id
pub fn find(id: &str) -> Option<&'static ProviderDescriptor> {
    catalog().iter().find(|p| p.id == id)
}

fn build_catalog() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor {
            id: "gemini",
            display_name: "Google Gemini",
            wire_format: WireFormat::Gemini,
            base_url: "https://generativelanguage.googleapis.com/v1beta",
            models: vec![
                model(
                    "gemini-2.0-flash",
                    "Gemini 2.0 Flash",
                    "Fast general model, generous free tier",
                    Some(RateLimits {
                        rpm: 15,
                        tpm: 1_000_000,
                        rpd: 1_500,
                    }),
                ),
                model(
                    "gemini-2.0-flash-lite",
                    "Gemini 2.0 Flash Lite",
                    "Cheapest Gemini tier",
                    Some(RateLimits {
                        rpm: 30,
                        tpm: 1_000_000,
                        rpd: 1_500,
                    }),
                ),
                model(
                    "gemini-1.5-pro",
                    "Gemini 1.5 Pro",
                    "Long-context model, tight free limits",
                    Some(RateLimits {
                        rpm: 2,
                        tpm: 32_000,
                        rpd: 50,
                    }),
                ),
            ],
            default_model: "gemini-2.0-flash",
            region: "us",
            requires_proxy: true,
            default_limits: RateLimits {
                rpm: 15,
                tpm: 1_000_000,
                rpd: 1_500,
            },
        },
        ProviderDescriptor {
            id: "openrouter",
            display_name: "OpenRouter",
            wire_format: WireFormat::OpenAiCompatible,
            base_url: "https://openrouter.ai/api/v1",
            models: vec![
                model(
                    "meta-llama/llama-3.3-70b-instruct:free",
                    "Llama 3.3 70B (free)",
                    "Free community pool, variable latency",
                    None,
                ),
                model(
                    "google/gemma-3-27b-it:free",
                    "Gemma 3 27B (free)",
                    "Free community pool",
                    None,
                ),
            ],
            default_model: "meta-llama/llama-3.3-70b-instruct:free",
            region: "global",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 20,
                tpm: 100_000,
                rpd: 200,
            },
        },
        ProviderDescriptor {
            id: "groq",
            display_name: "Groq",
            wire_format: WireFormat::OpenAiCompatible,
            base_url: "https://api.groq.com/openai/v1",
            models: vec![
                model(
                    "llama-3.3-70b-versatile",
                    "Llama 3.3 70B Versatile",
                    "Very fast inference",
                    Some(RateLimits {
                        rpm: 30,
                        tpm: 12_000,
                        rpd: 1_000,
                    }),
                ),
                model(
                    "llama-3.1-8b-instant",
                    "Llama 3.1 8B Instant",
                    "Fastest, weakest",
                    Some(RateLimits {
                        rpm: 30,
                        tpm: 6_000,
                        rpd: 14_400,
                    }),
                ),
            ],
            default_model: "llama-3.3-70b-versatile",
            region: "us",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 30,
                tpm: 12_000,
                rpd: 1_000,
            },
        },
        ProviderDescriptor {
            id: "mistral",
            display_name: "Mistral AI",
            wire_format: WireFormat::OpenAiCompatible,
            base_url: "https://api.mistral.ai/v1",
            models: vec![
                model(
                    "mistral-large-latest",
                    "Mistral Large",
                    "Flagship model",
                    None,
                ),
                model(
                    "mistral-small-latest",
                    "Mistral Small",
                    "Budget tier",
                    None,
                ),
            ],
            default_model: "mistral-small-latest",
            region: "eu",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 60,
                tpm: 500_000,
                rpd: 0,
            },
        },
        ProviderDescriptor {
            id: "together",
            display_name: "Together AI",
            wire_format: WireFormat::OpenAiCompatible,
            base_url: "https://api.together.xyz/v1",
            models: vec![model(
                "meta-llama/Llama-3.3-70B-Instruct-Turbo",
                "Llama 3.3 70B Turbo",
                "Hosted open-weights",
                None,
            )],
            default_model: "meta-llama/Llama-3.3-70B-Instruct-Turbo",
            region: "us",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 60,
                tpm: 180_000,
                rpd: 0,
            },
        },
        ProviderDescriptor {
            id: "deepseek",
            display_name: "DeepSeek",
            wire_format: WireFormat::OpenAiCompatible,
            base_url: "https://api.deepseek.com/v1",
            models: vec![model(
                "deepseek-chat",
                "DeepSeek Chat",
                "General chat model",
                None,
            )],
            default_model: "deepseek-chat",
            region: "cn",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 60,
                tpm: 500_000,
                rpd: 0,
            },
        },
        ProviderDescriptor {
            id: "huggingface",
            display_name: "Hugging Face",
            wire_format: WireFormat::HuggingFace,
            base_url: "https://router.huggingface.co",
            models: vec![model(
                "meta-llama/Llama-3.3-70B-Instruct",
                "Llama 3.3 70B Instruct",
                "Serverless inference; cold starts answer 503",
                None,
            )],
            default_model: "meta-llama/Llama-3.3-70B-Instruct",
            region: "global",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 10,
                tpm: 50_000,
                rpd: 300,
            },
        },
        ProviderDescriptor {
            id: "cloudflare",
            display_name: "Cloudflare Workers AI",
            wire_format: WireFormat::Cloudflare,
            base_url: "https://api.cloudflare.com/client/v4",
            models: vec![model(
                "@cf/meta/llama-3.1-8b-instruct",
                "Llama 3.1 8B Instruct",
                "Edge-hosted, needs an account id",
                None,
            )],
            default_model: "@cf/meta/llama-3.1-8b-instruct",
            region: "global",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 20,
                tpm: 100_000,
                rpd: 10_000,
            },
        },
        ProviderDescriptor {
            id: "cohere",
            display_name: "Cohere",
            wire_format: WireFormat::Cohere,
            base_url: "https://api.cohere.com/v1",
            models: vec![
                model(
                    "command-r-plus",
                    "Command R+",
                    "Flagship RAG model",
                    None,
                ),
                model("command-r", "Command R", "Budget tier", None),
            ],
            default_model: "command-r",
            region: "us",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 20,
                tpm: 100_000,
                rpd: 1_000,
            },
        },
        ProviderDescriptor {
            id: "ai21",
            display_name: "AI21 Labs",
            wire_format: WireFormat::Ai21,
            base_url: "https://api.ai21.com",
            models: vec![model(
                "j2-ultra",
                "Jurassic-2 Ultra",
                "Completion-style API",
                None,
            )],
            default_model: "j2-ultra",
            region: "us",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 10,
                tpm: 50_000,
                rpd: 0,
            },
        },
        ProviderDescriptor {
            id: "clarifai",
            display_name: "Clarifai",
            wire_format: WireFormat::Clarifai,
            base_url: "https://api.clarifai.com",
            models: vec![model(
                "gpt-4-turbo",
                "GPT-4 Turbo (hosted)",
                "Third-party hosted frontier model",
                None,
            )],
            default_model: "gpt-4-turbo",
            region: "us",
            requires_proxy: false,
            default_limits: RateLimits {
                rpm: 10,
                tpm: 50_000,
                rpd: 100,
            },
        },
    ]
}
