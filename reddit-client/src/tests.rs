#[cfg(test)]
mod tests {
    use crate::{
        PostSearch, RateLimitConfig, RedditClient, RedditClientConfig, RedditCredentials,
        RetryConfig, SearchQuery,
    };
    use brandscout_core::{ConfigError, CoreError, RedditApiError, RedditConfig, RetrySettings};
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> RedditClientConfig {
        RedditClientConfig {
            credentials: RedditCredentials {
                client_id: Some("test_client_id".to_string()),
                client_secret: Some("test_client_secret".to_string()),
            },
            user_agent: "brandscout-test/1.0".to_string(),
            page_size: 25,
            max_pages: 3,
            request_timeout: Duration::from_secs(5),
            api_base_url: server.uri(),
            token_url: format!("{}/api/v1/access_token", server.uri()),
            rate_limit: RateLimitConfig {
                max_requests: 600,
                time_window: Duration::from_secs(60),
                burst_allowance: 10,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 10,
                backoff_multiplier: 2.0,
                jitter_factor: 0.0,
            },
        }
    }

    fn token_body(token: &str) -> Value {
        json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 86400,
            "scope": "*"
        })
    }

    fn post_json(id: &str, title: &str, age_minutes: i64, stickied: bool) -> Value {
        let created = (Utc::now() - ChronoDuration::minutes(age_minutes)).timestamp();
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "name": format!("t3_{}", id),
                "title": title,
                "selftext": "",
                "subreddit": "smallbusiness",
                "permalink": format!("/r/smallbusiness/comments/{}/post/", id),
                "url": format!("https://www.reddit.com/r/smallbusiness/comments/{}/post/", id),
                "created_utc": created as f64,
                "score": 40,
                "num_comments": 12,
                "stickied": stickied,
                "over_18": false
            }
        })
    }

    fn listing(children: Vec<Value>, after: Option<&str>) -> Value {
        json!({
            "kind": "Listing",
            "data": { "after": after, "before": null, "children": children }
        })
    }

    async fn mount_token(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token)))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_subreddit_search_maps_posts_and_applies_window() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/r/smallbusiness/search"))
            .and(query_param("q", "best CRM"))
            .and(query_param("restrict_sr", "on"))
            .and(query_param("sort", "new"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![
                    post_json("pinned", "Weekly thread", 5, true),
                    post_json("fresh", "What's the best CRM for solopreneurs?", 10, false),
                    post_json("stale", "Best CRM in 2019", 60 * 48, false),
                ],
                Some("t3_stale"),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let query = SearchQuery::new("best CRM")
            .in_subreddit("smallbusiness")
            .since(Utc::now() - ChronoDuration::hours(24));

        let posts = client.search_posts(&query).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, "fresh");
        assert_eq!(posts[0].platform, "reddit");
        assert_eq!(posts[0].upvotes, 40);
        assert_eq!(posts[0].comment_count, 12);
        assert!(posts[0].body.is_none());
    }

    #[tokio::test]
    async fn test_pagination_follows_after_cursor() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("after", "t3_b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![post_json("c", "CRM migration", 30, false)],
                None,
            )))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![
                    post_json("a", "CRM for plumbers", 1, false),
                    post_json("b", "CRM for bakers", 2, false),
                ],
                Some("t3_b"),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let posts = client.search_posts(&SearchQuery::new("crm")).await.unwrap();

        let ids: Vec<&str> = posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_token_is_cached_between_searches() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
            .expect(2)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        client.search_posts(&SearchQuery::new("crm")).await.unwrap();
        client.search_posts(&SearchQuery::new("invoicing")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("revoked")))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        mount_token(&server, "renewed", 1).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("authorization", "Bearer revoked"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("authorization", "Bearer renewed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![post_json("a", "CRM question", 1, false)],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let posts = client.search_posts(&SearchQuery::new("crm")).await.unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_401_is_a_connection_failure() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 2).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let error = client
            .search_posts(&SearchQuery::new("crm"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::InvalidToken)
        ));
        assert!(error.is_connection_failure());
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![post_json("a", "CRM", 1, false)],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let posts = client.search_posts(&SearchQuery::new("crm")).await.unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let error = client
            .search_posts(&SearchQuery::new("crm"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 })
        ));
        assert!(!error.is_connection_failure());
    }

    #[tokio::test]
    async fn test_forbidden_subreddit_is_not_retried() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/r/private_club/search"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let error = client
            .search_posts(&SearchQuery::new("crm").in_subreddit("private_club"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_subreddit_maps_to_not_found() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        Mock::given(method("GET"))
            .and(path("/r/nosuchplace/search"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let error = client
            .search_posts(&SearchQuery::new("crm").in_subreddit("nosuchplace"))
            .await
            .unwrap_err();
        match error {
            CoreError::RedditApi(RedditApiError::SubredditNotFound { subreddit }) => {
                assert_eq!(subreddit, "nosuchplace")
            }
            other => panic!("Expected SubredditNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_authentication() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_client" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = RedditClient::new(test_config(&server)).unwrap();
        let error = client
            .search_posts(&SearchQuery::new("crm"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
        ));
        assert!(error.is_connection_failure());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_network() {
        let server = MockServer::start().await;
        let mut config = test_config(&server);
        config.credentials.client_secret = None;

        let client = RedditClient::new(config).unwrap();
        let error = client
            .search_posts(&SearchQuery::new("crm"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CoreError::Config(ConfigError::MissingEnvironmentVariable { .. })
        ));
        assert!(error.is_connection_failure());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_query_description() {
        assert_eq!(SearchQuery::new("crm").describe(), "'crm'");
        assert_eq!(
            SearchQuery::new("crm").in_subreddit("sales").describe(),
            "'crm' in r/sales"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config =
            RedditClientConfig::from_settings(&RedditConfig::default(), &RetrySettings::default());
        config.api_base_url = "not a url".to_string();
        assert!(matches!(
            RedditClient::new(config),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
