//! Hugging Face Provider
//!
//! Serverless inference through the HF router, chat-completions shaped.
//! Quirk: a model that is not resident answers 503 while it loads (cold
//! start); that is a retryable condition, not a fatal one, and rides the
//! uniform 503 retry class in `http`.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOptions, Provider, ProviderCore, http};
use crate::types::CompletionError;

pub struct HuggingFaceProvider {
    core: ProviderCore,
}

impl HuggingFaceProvider {
    pub fn new(core: ProviderCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
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
            "{}/models/{}/v1/chat/completions",
            self.core.descriptor.base_url, self.core.model
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
        let request = HfChatRequest {
            model: self.core.model.clone(),
            messages,
            temperature: options.temperature(),
            max_tokens: options.max_tokens(),
            stream: false,
        };

        debug!(model = %self.core.model, "Sending Hugging Face router request");
        let value = http::execute(&self.core, &url, &headers, &request).await?;

        let response: HfChatResponse = serde_json::from_value(value).map_err(|e| {
            CompletionError::parse(format!("unexpected Hugging Face response shape: {}", e))
                .provider(self.id())
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                CompletionError::parse("Hugging Face response contained no content")
                    .provider(self.id())
            })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct HfChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct HfChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
