use super::{build_http_client, network_error, status_error};
use crate::{GenerationRequest, TextGenerator};
use async_trait::async_trait;
use brandscout_core::{CoreError, LlmError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions API, also usable with compatible gateways via `base_url`.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens(),
            "temperature": 0.7,
            "messages": [
                { "role": "system", "content": request.system_instruction() },
                { "role": "user", "content": request.prompt },
            ],
        });

        info!(model = %self.model, url = %self.base_url, "Calling OpenAI chat completions");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            debug!("Unparseable OpenAI response: {}", e);
            LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            }
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(LlmError::ContentFiltered {
                reason: "completion stopped by the content filter".to_string(),
            }
            .into());
        }

        choice
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                LlmError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                }
                .into()
            })
    }
}
