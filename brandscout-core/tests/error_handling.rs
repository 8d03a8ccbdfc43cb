use brandscout_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, LlmError, RedditApiError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_INVALID_TOKEN");

    let db_error = CoreError::Database(DatabaseError::ConnectionFailed {
        reason: "not connected".to_string(),
    });
    assert_eq!(db_error.error_code(), "DB_CONNECTION_FAILED");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM_INVALID_API_KEY");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG_MISSING_FIELD");

    let busy = CoreError::ScanInProgress { brand_id: 3 };
    assert_eq!(busy.error_code(), "SCAN_IN_PROGRESS");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 });
    assert!(server_error.is_retryable());

    let bad_query = CoreError::RedditApi(RedditApiError::BadRequest {
        details: "query too long".to_string(),
    });
    assert!(!bad_query.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let timeout_error = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(30)));
}

#[test]
fn test_connection_failures_are_distinct_from_transient_errors() {
    assert!(CoreError::RedditApi(RedditApiError::InvalidToken).is_connection_failure());
    assert!(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "revoked".to_string()
    })
    .is_connection_failure());

    assert!(!CoreError::RedditApi(RedditApiError::RequestTimeout).is_connection_failure());
    assert!(!CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/r/private/search".to_string()
    })
    .is_connection_failure());
}

#[test]
fn test_store_unavailable_detection() {
    let unreachable = CoreError::Database(DatabaseError::ConnectionFailed {
        reason: "database not connected".to_string(),
    });
    assert!(unreachable.is_store_unavailable());

    let pool_closed: CoreError = sqlx::Error::PoolClosed.into();
    assert!(pool_closed.is_store_unavailable());

    let missing_row: CoreError = sqlx::Error::RowNotFound.into();
    assert!(!missing_row.is_store_unavailable());
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(!message.is_empty());
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("api_key"));

    let invalid = CoreError::Config(ConfigError::invalid("scan_frequency_hours", 5));
    assert!(invalid.user_friendly_message().contains("scan_frequency_hours"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new();

    // Both branches only log.
    reporter.report_error(&CoreError::RedditApi(RedditApiError::InvalidToken));
    reporter.report_error(&CoreError::RedditApi(RedditApiError::RateLimitExceeded {
        retry_after: 30,
    }));
}
