//! Text generation for suggested replies.

use async_trait::async_trait;
use brandscout_core::{CommentTone, CoreError, LlmConfig, LlmProviderKind};
use std::sync::Arc;
use std::time::Duration;

pub mod prompt;
pub mod providers;

#[cfg(test)]
mod tests;

pub use prompt::{build_reply_request, clean_reply};
pub use providers::{ClaudeProvider, OpenAiProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConstraints {
    pub max_words: u32,
    pub include_brand_mention: bool,
    pub brand_name: Option<String>,
    pub brand_description: Option<String>,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        Self {
            max_words: 120,
            include_brand_mention: false,
            brand_name: None,
            brand_description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub tone: CommentTone,
    pub constraints: GenerationConstraints,
}

impl GenerationRequest {
    /// Instruction block sent alongside the prompt.
    pub fn system_instruction(&self) -> String {
        prompt::system_instruction(self.tone, &self.constraints)
    }

    /// Rough output budget; a word is a little over one token on average.
    pub fn max_tokens(&self) -> u32 {
        (self.constraints.max_words * 2).clamp(64, 1024)
    }
}

/// External text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError>;
}

/// Builds the configured provider, or `None` when generation is switched off.
pub fn build_generator(config: &LlmConfig) -> Result<Option<Arc<dyn TextGenerator>>, CoreError> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let api_key = || {
        config
            .api_key
            .clone()
            .ok_or(brandscout_core::LlmError::NotConfigured)
    };

    let generator: Arc<dyn TextGenerator> = match config.provider {
        LlmProviderKind::None => return Ok(None),
        LlmProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            api_key()?,
            config.model.clone(),
            config.base_url.clone(),
            timeout,
        )?),
        LlmProviderKind::Claude => Arc::new(ClaudeProvider::new(
            api_key()?,
            config.model.clone(),
            config.base_url.clone(),
            timeout,
        )?),
    };
    Ok(Some(generator))
}
