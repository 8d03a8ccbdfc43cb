//! App-only OAuth for the Reddit API using the client-credentials grant.

use brandscout_core::{
    ConfigError, CoreError, RedditApiError, ENV_REDDIT_CLIENT_ID, ENV_REDDIT_CLIENT_SECRET,
};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before Reddit says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// Hands out a bearer token, fetching a new one only when the cached token
/// is missing, close to expiry, or was rejected by the API.
#[derive(Debug)]
pub struct TokenManager {
    credentials: RedditCredentials,
    token_url: String,
    http_client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        credentials: RedditCredentials,
        token_url: impl Into<String>,
        http_client: Client,
    ) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            http_client,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token if it is still the one that was rejected.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref().map(|t| t.access_token.as_str()) == Some(rejected) {
            debug!("Discarding rejected Reddit access token");
            *cached = None;
        }
    }

    fn oauth_client(&self) -> Result<BasicClient, CoreError> {
        let client_id = self.credentials.client_id.clone().ok_or_else(|| {
            ConfigError::MissingEnvironmentVariable {
                var_name: ENV_REDDIT_CLIENT_ID.to_string(),
            }
        })?;
        let client_secret = self.credentials.client_secret.clone().ok_or_else(|| {
            ConfigError::MissingEnvironmentVariable {
                var_name: ENV_REDDIT_CLIENT_SECRET.to_string(),
            }
        })?;

        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string())
            .map_err(|e| ConfigError::invalid("reddit.auth_url", e))?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| ConfigError::invalid("reddit.token_url", e))?;

        Ok(BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            auth_url,
            Some(token_url),
        ))
    }

    async fn fetch_token(&self) -> Result<CachedToken, CoreError> {
        let client = self.oauth_client()?;
        info!("Requesting Reddit application access token");

        let response = client
            .exchange_client_credentials()
            .add_scope(Scope::new("read".to_string()))
            .request_async(|request| send_oauth_request(&self.http_client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    RedditApiError::AuthenticationFailed {
                        reason: response.error().to_string(),
                    }
                    .into()
                }
                RequestTokenError::Request(e) if e.is_timeout() => {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                }
                RequestTokenError::Request(e) => CoreError::Network(e),
                RequestTokenError::Parse(e, _) => RedditApiError::AuthenticationFailed {
                    reason: format!("token endpoint rejected the credentials: {}", e),
                }
                .into(),
                RequestTokenError::Other(reason) => {
                    RedditApiError::AuthenticationFailed { reason }.into()
                }
            })?;

        let lifetime = response.expires_in().unwrap_or_else(|| {
            warn!("Token response carried no expiry, assuming one hour");
            DEFAULT_TOKEN_LIFETIME
        });
        debug!("Obtained Reddit access token valid for {:?}", lifetime);

        Ok(CachedToken {
            access_token: response.access_token().secret().clone(),
            expires_at: Instant::now() + lifetime,
        })
    }
}

/// Executes an oauth2 token request with the shared reqwest client so the
/// configured User-Agent is sent.
async fn send_oauth_request(
    client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;
    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
