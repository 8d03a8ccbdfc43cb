mod claude;
mod openai;

pub use claude::ClaudeProvider;
pub use openai::OpenAiProvider;

use brandscout_core::{CoreError, LlmError};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::error;

const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 30;

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, CoreError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub(crate) fn network_error(provider: &str, err: reqwest::Error) -> CoreError {
    error!("{} request failed: {}", provider, err);
    if err.is_timeout() {
        LlmError::RequestTimeout {
            provider: provider.to_string(),
        }
        .into()
    } else {
        CoreError::Network(err)
    }
}

/// Maps a non-success response to the matching `LlmError`.
pub(crate) async fn status_error(provider: &str, response: Response) -> CoreError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    error!("{} API error {}: {}", provider, status, truncate_body(&body));

    let provider = provider.to_string();
    match status {
        StatusCode::UNAUTHORIZED => LlmError::InvalidApiKey { provider },
        StatusCode::FORBIDDEN => LlmError::AuthenticationFailed { provider },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
            provider,
            retry_after: retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => LlmError::InvalidPrompt {
            reason: truncate_body(&body),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            LlmError::RequestTimeout { provider }
        }
        s if s.is_server_error() || s.as_u16() == 529 => LlmError::ServiceUnavailable { provider },
        _ => LlmError::InvalidResponseFormat { provider },
    }
    .into()
}

fn truncate_body(body: &str) -> String {
    brandscout_core::truncate_chars(body.trim(), 300)
}
