use crate::rate_limiter::RateLimiter;
use brandscout_core::{CandidatePost, CoreError, RedditApiError, PLATFORM_REDDIT};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub stickied: bool,
}

impl RedditPostData {
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_utc as i64, 0).single()
    }

    pub fn into_candidate(self) -> Option<CandidatePost> {
        let posted_at = self.posted_at()?;
        let body = if self.selftext.trim().is_empty() {
            None
        } else {
            Some(self.selftext)
        };
        Some(CandidatePost {
            post_id: self.id,
            platform: PLATFORM_REDDIT.to_string(),
            subreddit: self.subreddit,
            title: self.title,
            body,
            url: format!("{}{}", REDDIT_WEB_BASE, self.permalink),
            upvotes: self.score,
            comment_count: self.num_comments,
            posted_at,
        })
    }
}

/// One page of a search request.
#[derive(Debug, Clone)]
pub struct SearchPageRequest<'a> {
    pub term: &'a str,
    pub subreddit: Option<&'a str>,
    pub limit: u32,
    pub after: Option<&'a str>,
}

impl SearchPageRequest<'_> {
    pub fn endpoint(&self) -> String {
        match self.subreddit {
            Some(subreddit) => format!("/r/{}/search", subreddit),
            None => "/search".to_string(),
        }
    }
}

/// Thin authenticated transport over the OAuth API host. Every request
/// draws from the shared rate limiter first.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(
        http_client: Client,
        rate_limiter: Arc<RateLimiter>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            rate_limiter,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let _permit = self.rate_limiter.acquire_permit().await?;
        debug!("Acquired rate limit permit for {} {}", method, endpoint);

        let request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params);

        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        warn!("Request failed with status: {} for {}", status, endpoint);
        Err(CoreError::RedditApi(status_error(status, &response, endpoint)))
    }

    pub async fn search_page(
        &self,
        access_token: &str,
        request: &SearchPageRequest<'_>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = request.endpoint();
        let limit = request.limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("q", request.term),
            ("sort", "new"),
            ("type", "link"),
            ("limit", limit.as_str()),
            ("raw_json", "1"),
        ];
        if request.subreddit.is_some() {
            params.push(("restrict_sr", "on"));
        }
        if let Some(after) = request.after {
            params.push(("after", after));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, &params)
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse search results: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse search results for {}", endpoint),
            })
        })?;

        info!(
            "Retrieved {} posts for '{}' from {}",
            listing.data.children.len(),
            request.term,
            request
                .subreddit
                .map(|s| format!("r/{}", s))
                .unwrap_or_else(|| "all of Reddit".to_string())
        );
        Ok(listing)
    }
}

fn status_error(status: StatusCode, response: &Response, endpoint: &str) -> RedditApiError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<f64>().ok())
                .map(|secs| Duration::from_secs_f64(secs.max(0.0)).as_secs())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        StatusCode::NOT_FOUND => RedditApiError::SubredditNotFound {
            subreddit: endpoint
                .strip_prefix("/r/")
                .and_then(|rest| rest.split('/').next())
                .unwrap_or(endpoint)
                .to_string(),
        },
        StatusCode::BAD_REQUEST => RedditApiError::BadRequest {
            details: format!("{} rejected the query", endpoint),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RedditApiError::RequestTimeout,
        _ => RedditApiError::ServerError {
            status_code: status.as_u16(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_data(created_utc: f64, selftext: &str) -> RedditPostData {
        RedditPostData {
            id: "abc123".to_string(),
            title: "What's the best CRM for solopreneurs?".to_string(),
            selftext: selftext.to_string(),
            subreddit: "smallbusiness".to_string(),
            permalink: "/r/smallbusiness/comments/abc123/whats_the_best_crm/".to_string(),
            created_utc,
            score: 40,
            num_comments: 12,
            stickied: false,
        }
    }

    #[test]
    fn test_candidate_conversion() {
        let candidate = post_data(1_700_000_000.0, "Need something simple")
            .into_candidate()
            .unwrap();
        assert_eq!(candidate.post_id, "abc123");
        assert_eq!(candidate.platform, "reddit");
        assert_eq!(candidate.body.as_deref(), Some("Need something simple"));
        assert_eq!(
            candidate.url,
            "https://www.reddit.com/r/smallbusiness/comments/abc123/whats_the_best_crm/"
        );
        assert_eq!(candidate.upvotes, 40);
        assert_eq!(candidate.comment_count, 12);
        assert_eq!(candidate.posted_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_link_posts_have_no_body() {
        let candidate = post_data(1_700_000_000.0, "  ").into_candidate().unwrap();
        assert!(candidate.body.is_none());
    }

    #[test]
    fn test_search_endpoints() {
        let scoped = SearchPageRequest {
            term: "crm",
            subreddit: Some("smallbusiness"),
            limit: 100,
            after: None,
        };
        assert_eq!(scoped.endpoint(), "/r/smallbusiness/search");

        let global = SearchPageRequest {
            subreddit: None,
            ..scoped
        };
        assert_eq!(global.endpoint(), "/search");
    }
}
