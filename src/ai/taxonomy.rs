//! Vendor Error Taxonomy
//!
//! Converts raw vendor error text into a stable, friendly message, and
//! decides whether a message is a quota-exhaustion signal. Classification
//! is best-effort: unresolved text is returned unchanged, never discarded.
//!
//! ## Resolution order
//!
//! 1. Exact string-code containment match against the vendor table
//! 2. First 3-6 digit number in the text looked up in the vendor status
//!    table, with a nested sub-code keyword match when one is defined
//! 3. Keyword -> status heuristic, applied only when the vendor table
//!    defines that status
//! 4. Generic network/timeout keyword match
//! 5. Vendor-agnostic table keyed by HTTP status
//!
//! Vendors not enumerated here route through tiers 4-5 only.

use std::sync::OnceLock;

use regex::Regex;

// =============================================================================
// Table structure
// =============================================================================

/// Keyword refinement inside one status entry
struct SubCode {
    keyword: &'static str,
    message: &'static str,
}

/// One HTTP status row of a vendor table
struct StatusEntry {
    status: u16,
    default: &'static str,
    sub_codes: &'static [SubCode],
}

/// Vendor-specific string code (API error code or gRPC status string)
struct StringCode {
    code: &'static str,
    message: &'static str,
}

struct VendorTable {
    statuses: &'static [StatusEntry],
    string_codes: &'static [StringCode],
    /// Distinct per-vendor quota/billing signals (case-insensitive containment)
    quota_markers: &'static [&'static str],
    network_error: &'static str,
}

impl VendorTable {
    fn status(&self, status: u16) -> Option<&'static StatusEntry> {
        self.statuses.iter().find(|e| e.status == status)
    }
}

/// Refine a status entry by sub-code keyword, falling back to the default
fn match_sub_code(entry: &StatusEntry, lower: &str) -> &'static str {
    entry
        .sub_codes
        .iter()
        .find(|sc| lower.contains(&sc.keyword.to_lowercase()))
        .map_or(entry.default, |sc| sc.message)
}

// =============================================================================
// Vendor tables
// =============================================================================

static GEMINI: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 400,
            default: "Gemini rejected the request as invalid.",
            sub_codes: &[
                SubCode {
                    keyword: "API_KEY_INVALID",
                    message: "The Gemini API key is invalid. Check the key in settings.",
                },
                SubCode {
                    keyword: "FAILED_PRECONDITION",
                    message: "Gemini free tier is unavailable in this region; billing or a proxy is required.",
                },
            ],
        },
        StatusEntry {
            status: 403,
            default: "The Gemini API key lacks permission for this model.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 404,
            default: "The requested Gemini model was not found.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "Gemini rate limit reached. Wait a minute and try again.",
            sub_codes: &[SubCode {
                keyword: "RESOURCE_EXHAUSTED",
                message: "Gemini quota exhausted for today. Switch models or wait for the daily reset.",
            }],
        },
        StatusEntry {
            status: 500,
            default: "Gemini internal error. Try again shortly.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 503,
            default: "Gemini is overloaded right now. Try again shortly.",
            sub_codes: &[],
        },
    ],
    string_codes: &[
        StringCode {
            code: "API_KEY_INVALID",
            message: "The Gemini API key is invalid. Check the key in settings.",
        },
        StringCode {
            code: "PERMISSION_DENIED",
            message: "The Gemini API key lacks permission for this model.",
        },
    ],
    quota_markers: &["RESOURCE_EXHAUSTED", "exceeded your current quota"],
    network_error: "Could not reach Gemini. Check your connection or proxy.",
};

/// Shared by every OpenAI-compatible host (openrouter, groq, mistral,
/// together, deepseek)
static OPENAI_STYLE: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 400,
            default: "The provider rejected the request as invalid.",
            sub_codes: &[SubCode {
                keyword: "context_length_exceeded",
                message: "The prompt is too long for this model. Shorten the source content.",
            }],
        },
        StatusEntry {
            status: 401,
            default: "The API key is invalid or expired. Check the key in settings.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 402,
            default: "The account is out of credits. Top up or switch providers.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 403,
            default: "The API key is not allowed to use this model.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 404,
            default: "The requested model was not found on this provider.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "Rate limit reached. Wait a minute and try again.",
            sub_codes: &[SubCode {
                keyword: "insufficient_quota",
                message: "The account has run out of quota. Add billing or switch providers.",
            }],
        },
        StatusEntry {
            status: 500,
            default: "Provider internal error. Try again shortly.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 502,
            default: "Provider gateway error. Try again shortly.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 503,
            default: "The provider is overloaded. Try again shortly.",
            sub_codes: &[],
        },
    ],
    string_codes: &[
        StringCode {
            code: "insufficient_quota",
            message: "The account has run out of quota. Add billing or switch providers.",
        },
        StringCode {
            code: "invalid_api_key",
            message: "The API key is invalid or expired. Check the key in settings.",
        },
        StringCode {
            code: "model_not_found",
            message: "The requested model was not found on this provider.",
        },
        StringCode {
            code: "context_length_exceeded",
            message: "The prompt is too long for this model. Shorten the source content.",
        },
    ],
    quota_markers: &["insufficient_quota", "exceeded your current quota", "billing hard limit"],
    network_error: "Could not reach the provider. Check your connection.",
};

static HUGGINGFACE: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 401,
            default: "The Hugging Face token is invalid. Check the token in settings.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 402,
            default: "Hugging Face monthly included credits exhausted. Upgrade or switch providers.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 404,
            default: "The model is not available through the Hugging Face router.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "Hugging Face rate limit reached. Wait a minute and try again.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 503,
            default: "The model is loading (cold start). Retrying usually succeeds.",
            sub_codes: &[],
        },
    ],
    string_codes: &[StringCode {
        code: "exceeded your monthly included credits",
        message: "Hugging Face monthly included credits exhausted. Upgrade or switch providers.",
    }],
    quota_markers: &["exceeded your monthly included credits"],
    network_error: "Could not reach Hugging Face. Check your connection.",
};

static CLOUDFLARE: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 400,
            default: "Cloudflare rejected the request as invalid. Check the account id.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 401,
            default: "The Cloudflare API token is invalid.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 403,
            default: "The Cloudflare token lacks the Workers AI permission.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 404,
            default: "The Workers AI model or account was not found.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "Cloudflare rate limit reached. Wait a minute and try again.",
            sub_codes: &[SubCode {
                keyword: "3040",
                message: "Workers AI daily neuron allocation exhausted. Wait for the daily reset.",
            }],
        },
    ],
    string_codes: &[
        StringCode {
            code: "10000",
            message: "The Cloudflare API token is invalid.",
        },
        StringCode {
            code: "3040",
            message: "Workers AI daily neuron allocation exhausted. Wait for the daily reset.",
        },
    ],
    quota_markers: &["3040", "allocation"],
    network_error: "Could not reach Cloudflare. Check your connection.",
};

static COHERE: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 401,
            default: "The Cohere API key is invalid. Check the key in settings.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 404,
            default: "The requested Cohere model was not found.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "Cohere rate limit reached. Wait a minute and try again.",
            sub_codes: &[SubCode {
                keyword: "trial key",
                message: "The Cohere trial key monthly limit is spent. Upgrade or switch providers.",
            }],
        },
        StatusEntry {
            status: 500,
            default: "Cohere internal error. Try again shortly.",
            sub_codes: &[],
        },
    ],
    string_codes: &[StringCode {
        code: "too many tokens",
        message: "The prompt exceeds the Cohere model context. Shorten the source content.",
    }],
    quota_markers: &["trial key", "monthly limit"],
    network_error: "Could not reach Cohere. Check your connection.",
};

static AI21: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 401,
            default: "The AI21 API key is invalid. Check the key in settings.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "AI21 rate limit reached. Wait a minute and try again.",
            sub_codes: &[SubCode {
                keyword: "quota",
                message: "AI21 usage quota exhausted. Upgrade or switch providers.",
            }],
        },
        StatusEntry {
            status: 503,
            default: "AI21 is overloaded. Try again shortly.",
            sub_codes: &[],
        },
    ],
    string_codes: &[],
    quota_markers: &["maximum allowed quota"],
    network_error: "Could not reach AI21. Check your connection.",
};

static CLARIFAI: VendorTable = VendorTable {
    statuses: &[
        StatusEntry {
            status: 401,
            default: "The Clarifai key is invalid. Check the key in settings.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 404,
            default: "The requested Clarifai model was not found.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 429,
            default: "Clarifai rate limit reached. Wait a minute and try again.",
            sub_codes: &[],
        },
        StatusEntry {
            status: 500,
            default: "Clarifai internal error. Try again shortly.",
            sub_codes: &[],
        },
    ],
    string_codes: &[
        StringCode {
            code: "RESOURCE_EXHAUSTED",
            message: "Clarifai operation limit exhausted. Wait for the monthly reset or upgrade.",
        },
        StringCode {
            code: "UNAUTHENTICATED",
            message: "The Clarifai key is invalid. Check the key in settings.",
        },
    ],
    quota_markers: &["RESOURCE_EXHAUSTED"],
    network_error: "Could not reach Clarifai. Check your connection.",
};

fn vendor_table(provider_id: &str) -> Option<&'static VendorTable> {
    match provider_id {
        "gemini" => Some(&GEMINI),
        "openrouter" | "groq" | "mistral" | "together" | "deepseek" => Some(&OPENAI_STYLE),
        "huggingface" => Some(&HUGGINGFACE),
        "cloudflare" => Some(&CLOUDFLARE),
        "cohere" => Some(&COHERE),
        "ai21" => Some(&AI21),
        "clarifai" => Some(&CLARIFAI),
        _ => None,
    }
}

// =============================================================================
// Heuristics and generic fallback
// =============================================================================

/// Keyword -> status heuristics, applied only when the vendor table
/// defines that status
const KEYWORD_STATUS: &[(&str, u16)] = &[
    ("rate limit", 429),
    ("too many requests", 429),
    ("unauthorized", 401),
    ("invalid api key", 401),
    ("forbidden", 403),
    ("not found", 404),
    ("service unavailable", 503),
    ("overloaded", 503),
    ("bad request", 400),
    ("internal server error", 500),
];

const NETWORK_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "dns",
    "network",
    "unreachable",
    "connect error",
];

const GENERIC_NETWORK_ERROR: &str = "Network error: could not reach the provider.";

fn generic_status_message(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("The provider rejected the request as invalid."),
        401 => Some("The API key was rejected. Check the key in settings."),
        403 => Some("The API key is not allowed to perform this request."),
        404 => Some("The requested endpoint or model was not found."),
        429 => Some("Rate limit reached. Wait a minute and try again."),
        500 => Some("Provider internal error. Try again shortly."),
        502 | 504 => Some("Provider gateway error. Try again shortly."),
        503 => Some("The provider is temporarily unavailable. Try again shortly."),
        _ => None,
    }
}

/// First 3-6 digit number in the text
fn first_code(raw: &str) -> Option<u32> {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    let re = CODE_RE.get_or_init(|| Regex::new(r"\b(\d{3,6})\b").expect("valid regex"));
    re.captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// =============================================================================
// Public API
// =============================================================================

/// Resolve raw vendor error text into a friendly message
///
/// `status` is the HTTP status when the vendor answered at all; it feeds
/// only the generic fallback tier. Unresolved text comes back unchanged.
pub fn resolve(provider_id: &str, status: Option<u16>, raw: &str) -> String {
    let lower = raw.to_lowercase();

    if let Some(table) = vendor_table(provider_id) {
        // Tier 1: exact string-code containment
        for sc in table.string_codes {
            if lower.contains(&sc.code.to_lowercase()) {
                return sc.message.to_string();
            }
        }

        // Tier 2: first numeric code in the text, looked up per vendor
        if let Some(code) = first_code(raw)
            && code <= u32::from(u16::MAX)
            && let Some(entry) = table.status(code as u16)
        {
            return match_sub_code(entry, &lower).to_string();
        }

        // Tier 3: keyword -> status, only for statuses the vendor defines
        for (keyword, mapped) in KEYWORD_STATUS {
            if lower.contains(keyword)
                && let Some(entry) = table.status(*mapped)
            {
                return match_sub_code(entry, &lower).to_string();
            }
        }

        // Tier 4: network/timeout keywords, vendor-flavored message
        if NETWORK_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return table.network_error.to_string();
        }
    } else if NETWORK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return GENERIC_NETWORK_ERROR.to_string();
    }

    // Tier 5: vendor-agnostic table keyed by HTTP status
    let code = status
        .map(u32::from)
        .or_else(|| first_code(raw))
        .filter(|c| *c <= u32::from(u16::MAX));
    if let Some(code) = code
        && let Some(message) = generic_status_message(code as u16)
    {
        return message.to_string();
    }

    raw.to_string()
}

/// Whether the message carries this vendor's quota-exhaustion signal
///
/// Distinct signal per vendor; unmapped vendors always answer false and
/// route through the generic fallback only.
pub fn is_quota_error(provider_id: &str, message: &str) -> bool {
    let Some(table) = vendor_table(provider_id) else {
        return false;
    };
    let lower = message.to_lowercase();
    table
        .quota_markers
        .iter()
        .any(|marker| lower.contains(&marker.to_lowercase()))
}
