//! Cohere Provider
//!
//! Chat endpoint with a `message`/`preamble` body instead of a message
//! list; generated text comes back at the top-level `text` field.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOptions, Provider, ProviderCore, http};
use crate::types::CompletionError;

pub struct CohereProvider {
    core: ProviderCore,
}

impl CohereProvider {
    pub fn new(core: ProviderCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Provider for CohereProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProviderCore {
        &mut self.core
    }

    async fn complete(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let key = self.core.require_key()?.expose_secret().to_string();
        self.core.admit(prompt, system_instruction)?;

        let url = format!("{}/chat", self.core.descriptor.base_url);
        let headers = [("Authorization", format!("Bearer {}", key))];
        let request = ChatRequest {
            model: self.core.model.clone(),
            message: prompt.to_string(),
            preamble: system_instruction.map(str::to_string),
            temperature: options.temperature(),
            max_tokens: options.max_tokens(),
            p: options.top_p,
            k: options.top_k,
        };

        debug!(model = %self.core.model, "Sending Cohere chat request");
        let value = http::execute(&self.core, &url, &headers, &request).await?;

        let response: ChatResponse = serde_json::from_value(value).map_err(|e| {
            CompletionError::parse(format!("unexpected Cohere response shape: {}", e))
                .provider(self.id())
        })?;

        response.text.filter(|t| !t.is_empty()).ok_or_else(|| {
            CompletionError::parse("Cohere response contained no text").provider(self.id())
        })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_path() {
        let value = serde_json::json!({"text": "command answer", "generation_id": "g1"});
        let response: ChatResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response.text.as_deref(), Some("command answer"));
    }

    #[test]
    fn test_preamble_skipped_when_absent() {
        let request = ChatRequest {
            model: "command-r".to_string(),
            message: "hi".to_string(),
            preamble: None,
            temperature: 0.7,
            max_tokens: 4096,
            p: None,
            k: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("preamble").is_none());
    }
}
