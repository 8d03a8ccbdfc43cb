#[cfg(test)]
mod tests {
    use crate::{
        build_generator, build_reply_request, ClaudeProvider, GenerationConstraints,
        GenerationRequest, OpenAiProvider, TextGenerator,
    };
    use brandscout_core::{
        CommentTone, CoreError, LlmConfig, LlmError, LlmProviderKind, Opportunity,
        OpportunityStatus, Settings,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "Subreddit: r/smallbusiness\nTitle: What's the best CRM?\n\nWrite the reply."
                .to_string(),
            tone: CommentTone::Helpful,
            constraints: GenerationConstraints {
                max_words: 80,
                include_brand_mention: true,
                brand_name: Some("Acme CRM".to_string()),
                brand_description: None,
            },
        }
    }

    fn openai(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test".to_string(),
            None,
            Some(server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn claude(server: &MockServer) -> ClaudeProvider {
        ClaudeProvider::new(
            "sk-ant-test".to_string(),
            Some("claude-test".to_string()),
            Some(server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_openai_generates_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Start with a spreadsheet." },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = openai(&server).generate(&request()).await.unwrap();
        assert_eq!(text, "Start with a spreadsheet.");
    }

    #[tokio::test]
    async fn test_openai_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let error = openai(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::Llm(LlmError::InvalidApiKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let error = openai(&server).generate(&request()).await.unwrap_err();
        match error {
            CoreError::Llm(LlmError::RateLimitExceeded { retry_after, .. }) => {
                assert_eq!(retry_after, 12)
            }
            other => panic!("Expected RateLimitExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_completion_is_a_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "   " }, "finish_reason": "stop" }]
            })))
            .mount(&server)
            .await;

        let error = openai(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::Llm(LlmError::InvalidResponseFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_claude_generates_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({ "model": "claude-test" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [
                    { "type": "text", "text": "I'd look at " },
                    { "type": "text", "text": "Acme CRM (I work there)." }
                ],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = claude(&server).generate(&request()).await.unwrap();
        assert_eq!(text, "I'd look at Acme CRM (I work there).");
    }

    #[tokio::test]
    async fn test_claude_overloaded_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let error = claude(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(
            error,
            CoreError::Llm(LlmError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn test_build_generator_from_config() {
        let disabled = build_generator(&LlmConfig::default()).unwrap();
        assert!(disabled.is_none());

        let config = LlmConfig {
            provider: LlmProviderKind::Claude,
            api_key: Some("sk-ant".to_string()),
            ..LlmConfig::default()
        };
        let generator = build_generator(&config).unwrap().unwrap();
        assert_eq!(generator.name(), "claude");

        let missing_key = LlmConfig {
            provider: LlmProviderKind::OpenAi,
            ..LlmConfig::default()
        };
        assert!(matches!(
            build_generator(&missing_key),
            Err(CoreError::Llm(LlmError::NotConfigured))
        ));
    }

    #[test]
    fn test_reply_request_uses_settings() {
        let opportunity = Opportunity {
            id: 7,
            brand_id: 1,
            platform: "reddit".to_string(),
            post_id: "abc".to_string(),
            subreddit: "smallbusiness".to_string(),
            title: "What's the best CRM for solopreneurs?".to_string(),
            body_snippet: Some("I run a one-person agency.".to_string()),
            post_url: "https://www.reddit.com/r/smallbusiness/comments/abc/".to_string(),
            upvotes: 40,
            comment_count: 12,
            posted_at: Utc::now(),
            relevance_score: 63,
            opportunity_type: "recommendation_request".to_string(),
            matched_keywords: vec!["best CRM".to_string()],
            status: OpportunityStatus::Pending,
            suggested_comment: None,
            comment_tone: None,
            discovered_at: Utc::now(),
            status_updated_at: None,
        };
        let mut settings = Settings::defaults_for(1);
        settings.comment_tone = CommentTone::Professional;
        settings.include_brand_mention = false;

        let request = build_reply_request(&opportunity, &settings, 90);
        assert!(request.prompt.contains("r/smallbusiness"));
        assert!(request.prompt.contains("one-person agency"));
        assert!(request.prompt.contains("best CRM"));
        assert_eq!(request.tone, CommentTone::Professional);
        assert_eq!(request.constraints.max_words, 90);
        assert!(!request.constraints.include_brand_mention);
        assert!(request.system_instruction().contains("Do not mention"));
    }
}
