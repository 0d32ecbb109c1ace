//! Cloudflare Workers AI Provider
//!
//! Quirk: requests need an account id templated into the path, so
//! `is_configured` demands both key and account id. Text comes back at
//! `result.response`.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOptions, Provider, ProviderCore, http};
use crate::types::CompletionError;

pub struct CloudflareProvider {
    core: ProviderCore,
}

impl CloudflareProvider {
    pub fn new(core: ProviderCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Provider for CloudflareProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProviderCore {
        &mut self.core
    }

    fn is_configured(&self) -> bool {
        self.core.api_key.is_some() && self.core.account_id.is_some()
    }

    async fn complete(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let key = self.core.require_key()?.expose_secret().to_string();
        let account_id = self.core.account_id.as_deref().ok_or_else(|| {
            CompletionError::configuration("Cloudflare requires an account id")
                .provider(self.id())
        })?;
        self.core.admit(prompt, system_instruction)?;

        let url = format!(
            "{}/accounts/{}/ai/run/{}",
            self.core.descriptor.base_url, account_id, self.core.model
        );
        let headers = [("Authorization", format!("Bearer {}", key))];

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_instruction {
            messages.push(Message {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(Message {
            role: "user",
            content: prompt.to_string(),
        });
        let request = WorkersAiRequest {
            messages,
            temperature: options.temperature(),
            max_tokens: options.max_tokens(),
        };

        debug!(model = %self.core.model, "Sending Workers AI request");
        let value = http::execute(&self.core, &url, &headers, &request).await?;

        let response: WorkersAiResponse = serde_json::from_value(value).map_err(|e| {
            CompletionError::parse(format!("unexpected Workers AI response shape: {}", e))
                .provider(self.id())
        })?;

        response
            .result
            .and_then(|r| r.response)
            .ok_or_else(|| {
                CompletionError::parse("Workers AI response contained no result")
                    .provider(self.id())
            })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct WorkersAiRequest {
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WorkersAiResponse {
    result: Option<WorkersAiResult>,
}

#[derive(Debug, Deserialize)]
struct WorkersAiResult {
    response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_path() {
        let value = serde_json::json!({
            "result": {"response": "edge answer"},
            "success": true
        });
        let response: WorkersAiResponse = serde_json::from_value(value).unwrap();
        assert_eq!(
            response.result.unwrap().response.as_deref(),
            Some("edge answer")
        );
    }
}
