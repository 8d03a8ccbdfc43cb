use super::{build_http_client, network_error, status_error};
use crate::{GenerationRequest, TextGenerator};
use async_trait::async_trait;
use brandscout_core::{CoreError, LlmError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const PROVIDER: &str = "claude";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API.
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
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
impl TextGenerator for ClaudeProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens(),
            "system": request.system_instruction(),
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        info!(model = %self.model, url = %self.base_url, "Calling Anthropic messages");
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let message: MessagesResponse = response.json().await.map_err(|e| {
            debug!("Unparseable Anthropic response: {}", e);
            LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            }
        })?;

        if message.stop_reason.as_deref() == Some("refusal") {
            return Err(LlmError::ContentFiltered {
                reason: "the model declined to answer".to_string(),
            }
            .into());
        }

        let text: String = message
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            }
            .into());
        }
        Ok(text)
    }
}
