//! Reddit platform client: app-only OAuth, rate-limited search with
//! pagination, and retries for transient failures.

use async_trait::async_trait;
use brandscout_core::{
    CandidatePost, ConfigError, CoreError, RedditApiError, RedditConfig, RetrySettings,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod api;
pub mod auth;
pub mod rate_limiter;
pub mod retry;

#[cfg(test)]
mod tests;

pub use api::{RedditApiClient, RedditPostData, REDDIT_API_BASE};
pub use auth::{RedditCredentials, TokenManager, REDDIT_TOKEN_URL};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor};

/// A single keyword query against the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub term: String,
    /// Restricts the search to one subreddit; `None` searches the whole platform.
    pub subreddit: Option<String>,
    /// Posts older than this are not returned.
    pub since: Option<DateTime<Utc>>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            subreddit: None,
            since: None,
        }
    }

    pub fn in_subreddit(mut self, subreddit: impl Into<String>) -> Self {
        self.subreddit = Some(subreddit.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn describe(&self) -> String {
        match &self.subreddit {
            Some(subreddit) => format!("'{}' in r/{}", self.term, subreddit),
            None => format!("'{}'", self.term),
        }
    }
}

/// Source of candidate posts. Pagination, rate limiting and retries are the
/// implementation's concern; callers see one fallible call per query.
#[async_trait]
pub trait PostSearch: Send + Sync {
    async fn search_posts(&self, query: &SearchQuery) -> Result<Vec<CandidatePost>, CoreError>;
}

#[derive(Debug, Clone)]
pub struct RedditClientConfig {
    pub credentials: RedditCredentials,
    pub user_agent: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub request_timeout: Duration,
    pub api_base_url: String,
    pub token_url: String,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
}

impl RedditClientConfig {
    pub fn from_settings(reddit: &RedditConfig, retry: &RetrySettings) -> Self {
        Self {
            credentials: RedditCredentials {
                client_id: reddit.client_id.clone(),
                client_secret: reddit.client_secret.clone(),
            },
            user_agent: reddit.user_agent.clone(),
            page_size: reddit.page_size.clamp(1, 100),
            max_pages: reddit.max_pages.max(1),
            request_timeout: Duration::from_secs(30),
            api_base_url: REDDIT_API_BASE.to_string(),
            token_url: REDDIT_TOKEN_URL.to_string(),
            rate_limit: RateLimitConfig::from(reddit),
            retry: RetryConfig::from(retry),
        }
    }
}

pub struct RedditClient {
    api: RedditApiClient,
    tokens: TokenManager,
    retry: RetryExecutor,
    page_size: u32,
    max_pages: u32,
}

impl RedditClient {
    pub fn new(config: RedditClientConfig) -> Result<Self, CoreError> {
        for (field, value) in [
            ("reddit.api_base_url", &config.api_base_url),
            ("reddit.token_url", &config.token_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::invalid(field, format!("{} ({})", value, e)))?;
        }

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let api = RedditApiClient::new(http_client.clone(), rate_limiter, config.api_base_url);
        let tokens = TokenManager::new(config.credentials, config.token_url, http_client);

        Ok(Self {
            api,
            tokens,
            retry: RetryExecutor::new(config.retry),
            page_size: config.page_size,
            max_pages: config.max_pages,
        })
    }

    /// One page with a single token refresh if the cached token is rejected.
    async fn fetch_page(
        &self,
        query: &SearchQuery,
        after: Option<&str>,
    ) -> Result<api::RedditListing<RedditPostData>, CoreError> {
        let request = api::SearchPageRequest {
            term: &query.term,
            subreddit: query.subreddit.as_deref(),
            limit: self.page_size,
            after,
        };

        let token = self.tokens.access_token().await?;
        match self.api.search_page(&token, &request).await {
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Access token rejected, requesting a new one");
                self.tokens.invalidate(&token).await;
                let token = self.tokens.access_token().await?;
                self.api.search_page(&token, &request).await
            }
            other => other,
        }
    }

    async fn search_once(&self, query: &SearchQuery) -> Result<Vec<CandidatePost>, CoreError> {
        let mut posts = Vec::new();
        let mut seen = HashSet::new();
        let mut after: Option<String> = None;

        for page in 0..self.max_pages {
            let listing = self.fetch_page(query, after.as_deref()).await?;
            let mut reached_window_start = false;

            for child in listing.data.children {
                if child.data.stickied {
                    continue;
                }
                let Some(candidate) = child.data.into_candidate() else {
                    continue;
                };
                if let Some(since) = query.since {
                    if candidate.posted_at < since {
                        reached_window_start = true;
                        continue;
                    }
                }
                if seen.insert(candidate.post_id.clone()) {
                    posts.push(candidate);
                }
            }

            after = listing.data.after;
            if reached_window_start || after.is_none() {
                debug!("Search {} stopped after page {}", query.describe(), page + 1);
                break;
            }
        }

        Ok(posts)
    }
}

#[async_trait]
impl PostSearch for RedditClient {
    async fn search_posts(&self, query: &SearchQuery) -> Result<Vec<CandidatePost>, CoreError> {
        let operation = format!("search {}", query.describe());
        let posts = self
            .retry
            .execute(&operation, || self.search_once(query))
            .await?;
        info!("Search {} returned {} recent posts", query.describe(), posts.len());
        Ok(posts)
    }
}
