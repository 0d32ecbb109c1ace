//! AI21 Labs Provider
//!
//! Completion-style API: model in the path, `prompt` in the body, text at
//! `completions[0].data.text`. The system instruction is folded into the
//! prompt since the wire format has no separate slot for it.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOptions, Provider, ProviderCore, http};
use crate::types::CompletionError;

pub struct Ai21Provider {
    core: ProviderCore,
}

impl Ai21Provider {
    pub fn new(core: ProviderCore) -> Self {
        Self { core }
    }

    fn fold_prompt(prompt: &str, system_instruction: Option<&str>) -> String {
        match system_instruction {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        }
    }
}

#[async_trait]
impl Provider for Ai21Provider {
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

        let url = format!(
            "{}/studio/v1/{}/complete",
            self.core.descriptor.base_url, self.core.model
        );
        let headers = [("Authorization", format!("Bearer {}", key))];
        let request = CompleteRequest {
            prompt: Self::fold_prompt(prompt, system_instruction),
            max_tokens: options.max_tokens(),
            temperature: options.temperature(),
            top_p: options.top_p,
        };

        debug!(model = %self.core.model, "Sending AI21 complete request");
        let value = http::execute(&self.core, &url, &headers, &request).await?;

        let response: CompleteResponse = serde_json::from_value(value).map_err(|e| {
            CompletionError::parse(format!("unexpected AI21 response shape: {}", e))
                .provider(self.id())
        })?;

        response
            .completions
            .into_iter()
            .next()
            .map(|c| c.data.text)
            .ok_or_else(|| {
                CompletionError::parse("AI21 response contained no completions")
                    .provider(self.id())
            })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct CompleteRequest {
    prompt: String,
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
    temperature: f32,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompleteResponse {
    #[serde(default)]
    completions: Vec<Completion>,
}

#[derive(Debug, Deserialize)]
struct Completion {
    data: CompletionData,
}

#[derive(Debug, Deserialize)]
struct CompletionData {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_path() {
        let value = serde_json::json!({
            "completions": [{"data": {"text": "jurassic answer"}}]
        });
        let response: CompleteResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response.completions[0].data.text, "jurassic answer");
    }

    #[test]
    fn test_fold_prompt() {
        assert_eq!(
            Ai21Provider::fold_prompt("ask", Some("be terse")),
            "be terse\n\nask"
        );
        assert_eq!(Ai21Provider::fold_prompt("ask", None), "ask");
    }
}
