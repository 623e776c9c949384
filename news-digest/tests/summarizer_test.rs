mod common;

use anyhow::Result;
use common::*;
use news_digest::config::SummarizationConfig;
use news_digest::llm_adapter::{parse_summary, AnthropicSummarizer, ExtractiveSummarizer};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_config(server: &MockServer) -> SummarizationConfig {
    SummarizationConfig {
        api_base: server.uri(),
        base_delay: 0.0,
        max_delay: 0.0,
        timeout: 5,
        ..SummarizationConfig::default()
    }
}

fn reply(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }]
    })
}

#[tokio::test]
async fn test_anthropic_summary_is_parsed() -> Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    let text = "```json\n{\"headline\": \"Agents ship\", \"synopsis\": \"LLM agents shipped.\", \
                \"key_points\": [\"Faster\", \"Cheaper\"], \"tags\": [\"LLM\", \"agents\"]}\n```";
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(text)))
        .expect(1)
        .mount(&server)
        .await;

    let summarizer = AnthropicSummarizer::new(&provider_config(&server), "test-key".to_string(), "AI")?;
    let story = article("alpha", "https://alpha.example.com/1", "LLM agents ship");
    let summary = summarizer.summarize(&story).await?;

    assert_eq!(summary.article_ref, story.url);
    assert_eq!(summary.headline, "Agents ship");
    assert_eq!(summary.key_points, vec!["Faster", "Cheaper"]);
    assert!(summary.relevance_tags.contains("llm"));
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_is_retried_by_policy() -> Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"synopsis\": \"Recovered.\"}")))
        .mount(&server)
        .await;

    let config = provider_config(&server);
    let summarizer = AnthropicSummarizer::new(&config, "test-key".to_string(), "AI")?;
    let policy = RetryPolicy::for_summarization(&config);
    let story = article("alpha", "https://alpha.example.com/1", "LLM agents ship");

    let attempted = policy.run("test", || summarizer.summarize(&story)).await;
    assert_eq!(attempted.attempts, 2);
    let summary = attempted.result?;
    assert_eq!(summary.synopsis, "Recovered.");
    assert_eq!(summary.headline, "LLM agents ship");
    Ok(())
}

#[tokio::test]
async fn test_provider_failures_are_classified() -> Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "expired"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "prose"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Sorry, I cannot help.")))
        .mount(&server)
        .await;

    let config = provider_config(&server);
    let story = article("alpha", "https://alpha.example.com/1", "LLM agents ship");

    let expired = AnthropicSummarizer::new(&config, "expired".to_string(), "AI")?;
    let err = expired.summarize(&story).await.expect_err("401");
    assert!(err.is_quota_exhausted());
    assert!(!err.is_retryable());

    let broken = AnthropicSummarizer::new(&config, "broken".to_string(), "AI")?;
    let err = broken.summarize(&story).await.expect_err("500");
    assert!(matches!(err, SummarizationError::Provider { status: Some(500), .. }));
    assert!(err.is_retryable());

    let prose = AnthropicSummarizer::new(&config, "prose".to_string(), "AI")?;
    let err = prose.summarize(&story).await.expect_err("no JSON");
    assert!(matches!(err, SummarizationError::MalformedResponse(_)));
    Ok(())
}

#[test]
fn test_parse_summary_accepts_field_aliases() {
    let story = article("alpha", "https://alpha.example.com/1", "Original title");
    let summary = parse_summary(
        "Here you go: {\"short_summary\": \"Aliased.\", \"key_insights\": [\" one \"], \
         \"relevance_tags\": [\"GPU\"]} Thanks!",
        &story,
    )
    .expect("parses");

    assert_eq!(summary.headline, "Original title");
    assert_eq!(summary.synopsis, "Aliased.");
    assert_eq!(summary.key_points, vec!["one"]);
    assert!(summary.relevance_tags.contains("gpu"));
}

#[tokio::test]
async fn test_extractive_summary_is_deterministic() -> Result<()> {
    let summarizer = ExtractiveSummarizer::new(vec!["LLM".to_string(), "GPU".to_string()]);
    let story = article("alpha", "https://alpha.example.com/1", "LLM agents ship");

    let first = summarizer.summarize(&story).await?;
    let second = summarizer.summarize(&story).await?;
    assert_eq!(first, second);
    assert_eq!(first.headline, "LLM agents ship");
    assert!(first.synopsis.starts_with("Researchers published new results"));
    assert_eq!(first.key_points.len(), 1);
    assert!(first.relevance_tags.contains("llm"));
    assert!(!first.relevance_tags.contains("gpu"));
    Ok(())
}
