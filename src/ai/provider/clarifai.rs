//! Clarifai Provider
//!
//! gRPC-gateway style REST API: auth header is `Authorization: Key ...`
//! rather than Bearer, inputs are nested data blocks, and text comes back
//! at `outputs[0].data.text.raw`. Error bodies carry gRPC status strings
//! (RESOURCE_EXHAUSTED and friends) that the taxonomy matches on.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOptions, Provider, ProviderCore, http};
use crate::types::CompletionError;

pub struct ClarifaiProvider {
    core: ProviderCore,
}

impl ClarifaiProvider {
    pub fn new(core: ProviderCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Provider for ClarifaiProvider {
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
            "{}/v2/models/{}/outputs",
            self.core.descriptor.base_url, self.core.model
        );
        let headers = [("Authorization", format!("Key {}", key))];

        // No dedicated system slot; prepend like a chat transcript
        let raw_text = match system_instruction {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };
        let request = OutputsRequest {
            inputs: vec![Input {
                data: InputData {
                    text: RawText { raw: raw_text },
                },
            }],
            model: ModelParams {
                output_info: OutputInfo {
                    params: InferenceParams {
                        temperature: options.temperature(),
                        max_tokens: options.max_tokens(),
                    },
                },
            },
        };

        debug!(model = %self.core.model, "Sending Clarifai outputs request");
        let value = http::execute(&self.core, &url, &headers, &request).await?;

        let response: OutputsResponse = serde_json::from_value(value).map_err(|e| {
            CompletionError::parse(format!("unexpected Clarifai response shape: {}", e))
                .provider(self.id())
        })?;

        response
            .outputs
            .into_iter()
            .next()
            .and_then(|o| o.data.text)
            .map(|t| t.raw)
            .ok_or_else(|| {
                CompletionError::parse("Clarifai response contained no outputs")
                    .provider(self.id())
            })
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OutputsRequest {
    inputs: Vec<Input>,
    model: ModelParams,
}

#[derive(Debug, Serialize)]
struct Input {
    data: InputData,
}

#[derive(Debug, Serialize)]
struct InputData {
    text: RawText,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawText {
    raw: String,
}

#[derive(Debug, Serialize)]
struct ModelParams {
    output_info: OutputInfo,
}

#[derive(Debug, Serialize)]
struct OutputInfo {
    params: InferenceParams,
}

#[derive(Debug, Serialize)]
struct InferenceParams {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OutputsResponse {
    #[serde(default)]
    outputs: Vec<Output>,
}

#[derive(Debug, Deserialize)]
struct Output {
    data: OutputData,
}

#[derive(Debug, Deserialize)]
struct OutputData {
    text: Option<RawText>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_path() {
        let value = serde_json::json!({
            "status": {"code": 10000, "description": "Ok"},
            "outputs": [{"data": {"text": {"raw": "clarifai answer"}}}]
        });
        let response: OutputsResponse = serde_json::from_value(value).unwrap();
        assert_eq!(
            response.outputs[0].data.text.as_ref().unwrap().raw,
            "clarifai answer"
        );
    }
}
