//! OpenAI-Compatible Provider
//!
//! Chat Completions wire format served by many hosts (OpenRouter, Groq,
//! Mistral, Together, DeepSeek). Bearer auth, `/chat/completions`
//! endpoint, text at `choices[0].message.content`.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOptions, Provider, ProviderCore, http};
use crate::types::CompletionError;

pub struct OpenAiCompatProvider {
    core: ProviderCore,
}

impl OpenAiCompatProvider {
    pub fn new(core: ProviderCore) -> Self {
        Self { core }
    }

    fn build_request(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        options: &CompletionOptions,
    ) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_instruction {
            messages.push(ChatMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.to_string(),
        });

        ChatCompletionRequest {
            model: self.core.model.clone(),
            messages,
            temperature: options.temperature(),
            max_tokens: options.max_tokens(),
            top_p: options.top_p,
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
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

        let url = format!("{}/chat/completions", self.core.descriptor.base_url);
        let headers = [("Authorization", format!("Bearer {}", key))];
        let request = self.build_request(prompt, system_instruction, options);

        debug!(provider = self.id(), model = %self.core.model, "Sending chat completion request");
        let value = http::execute(&self.core, &url, &headers, &request).await?;

        let response: ChatCompletionResponse = serde_json::from_value(value).map_err(|e| {
            CompletionError::parse(format!("unexpected chat completion shape: {}", e))
                .provider(self.id())
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                CompletionError::parse("chat completion contained no content").provider(self.id())
            })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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
