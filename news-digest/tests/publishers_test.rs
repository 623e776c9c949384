mod common;

use anyhow::Result;
use common::*;
use news_digest::config::{GitSiteConfig, MarkdownConfig, SocialConfig};
use news_digest::publishers::{
    compose_thread, newsletter_file_name, GitSitePublisher, MarkdownPublisher, ThreadPublisher,
};
use news_digest::types::{RunMetrics, TrendTopic};
use news_digest::DigestComposer;
use std::collections::BTreeSet;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn admitted(raw: RawArticle, score: f64) -> ScoredArticle {
    ScoredArticle {
        article: raw,
        quality_score: score,
        admitted: true,
        reasons: Vec::new(),
    }
}

fn summary_for(raw: &RawArticle, synopsis: &str) -> Summary {
    Summary {
        article_ref: raw.url.clone(),
        headline: raw.title.clone(),
        synopsis: synopsis.to_string(),
        key_points: vec!["First point".to_string(), "Second point".to_string()],
        relevance_tags: ["llm".to_string()].into_iter().collect(),
    }
}

fn sample_digest(count: usize) -> DigestDocument {
    let raws: Vec<RawArticle> = (0..count)
        .map(|i| {
            article_published(
                if i % 2 == 0 { "alpha" } else { "gamma" },
                &format!("https://news.example.com/story-{}", i),
                &format!("LLM story number {}", i),
                i as i64,
            )
        })
        .collect();
    let long_synopsis = "A very long synopsis sentence that keeps going. ".repeat(12);
    let summaries = raws.iter().map(|r| summary_for(r, &long_synopsis)).collect();
    let scored = raws
        .into_iter()
        .enumerate()
        .map(|(i, r)| admitted(r, 3.0 - i as f64 * 0.1))
        .collect();
    let topics = vec![TrendTopic {
        term: "LLM".to_string(),
        article_refs: BTreeSet::new(),
        strength: 1.0,
    }];

    DigestComposer::new("AI").compose(
        "run-1",
        test_now(),
        scored,
        summaries,
        topics,
        RunMetrics::new("run-1", test_now()),
    )
}

#[tokio::test]
async fn test_markdown_publisher_writes_archive() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let publisher = MarkdownPublisher::new(&MarkdownConfig {
        enabled: true,
        output_dir: dir.path().to_path_buf(),
        top_articles: 2,
    });
    let digest = sample_digest(4);

    let receipt = publisher.publish(&digest).await?;
    assert_eq!(receipt.channel, "markdown");

    assert_eq!(newsletter_file_name(&digest), "ai-2024-03-15.md");
    let newsletter = std::fs::read_to_string(dir.path().join("newsletters/ai-2024-03-15.md"))?;
    assert!(newsletter.starts_with("# AI News Digest - March 15, 2024"));
    assert!(newsletter.contains("https://news.example.com/story-0"));
    assert!(newsletter.contains("## Trending Topics"));

    let latest = std::fs::read_to_string(dir.path().join("newsletters/latest.md"))?;
    assert_eq!(latest, newsletter);

    let articles: Vec<_> = std::fs::read_dir(dir.path().join("articles"))?.collect();
    assert_eq!(articles.len(), 2);
    assert!(dir
        .path()
        .join("articles/2024-03-15-01-llm-story-number-0.md")
        .exists());

    let index = std::fs::read_to_string(dir.path().join("index.md"))?;
    assert!(index.contains("# News Digest Archive"));
    assert!(index.contains("newsletters/ai-2024-03-15.md"));
    assert!(!index.contains("- [latest]"));
    // newsletter, latest, two articles and the index
    assert_eq!(receipt.locations.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_article_files_never_collide() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut digest = sample_digest(3);
    digest.entries[0].summary.headline = "Same headline".to_string();
    digest.entries[1].summary.headline = "Same headline".to_string();
    digest.entries[2].summary.headline = "?!...".to_string();

    let publisher = MarkdownPublisher::new(&MarkdownConfig {
        enabled: true,
        output_dir: dir.path().to_path_buf(),
        top_articles: 3,
    });
    publisher.publish(&digest).await?;

    let mut names: Vec<String> = std::fs::read_dir(dir.path().join("articles"))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(
        names,
        vec![
            "2024-03-15-01-same-headline.md",
            "2024-03-15-02-same-headline.md",
            "2024-03-15-03.md",
        ]
    );
    Ok(())
}

#[test]
fn test_thread_posts_fit_length_limit() {
    let digest = sample_digest(4);
    let config = SocialConfig {
        newsletter_url: Some("https://digest.example.com/latest".to_string()),
        ..SocialConfig::default()
    };

    let posts = compose_thread(&digest, &config);

    // opening + 3 stories + trends + closing
    assert_eq!(posts.len(), 6);
    assert!(posts[0].starts_with("📰 AI News Digest"));
    assert!(posts[0].ends_with("🧵"));
    for (i, post) in posts.iter().enumerate() {
        assert!(
            post.chars().count() <= config.max_post_length,
            "post {} has {} chars",
            i,
            post.chars().count()
        );
    }
    assert!(posts[1].ends_with("Read more: https://news.example.com/story-0"));
    assert!(posts[4].contains("• LLM"));
    assert!(posts[5].ends_with("https://digest.example.com/latest"));
}

#[test]
fn test_empty_digest_has_no_thread() {
    let digest = sample_digest(0);
    assert!(digest.is_empty());
    assert!(compose_thread(&digest, &SocialConfig::default()).is_empty());
}

#[tokio::test]
async fn test_thread_publisher_chains_replies() -> Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "data": { "id": "1700", "text": "ok" }
        })))
        .expect(5)
        .mount(&server)
        .await;

    let token_env = "NEWS_DIGEST_TEST_THREAD_TOKEN";
    std::env::set_var(token_env, "test-token");

    let config = SocialConfig {
        enabled: true,
        api_base: server.uri(),
        token_env: token_env.to_string(),
        post_delay: 0.0,
        ..SocialConfig::default()
    };
    let publisher = ThreadPublisher::new(&config)?;
    let receipt = publisher.publish(&sample_digest(3)).await?;

    assert_eq!(receipt.channel, "social");
    assert_eq!(receipt.locations.len(), 5);

    let requests = server.received_requests().await.expect("recording enabled");
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body)?;
    assert!(first.get("reply").is_none());
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body)?;
    assert_eq!(second["reply"]["in_reply_to_tweet_id"], "1700");
    Ok(())
}

#[tokio::test]
async fn test_thread_publisher_requires_token() -> Result<()> {
    init_tracing();
    let config = SocialConfig {
        enabled: true,
        api_base: "http://127.0.0.1:9".to_string(),
        token_env: "NEWS_DIGEST_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
        post_delay: 0.0,
        ..SocialConfig::default()
    };
    let publisher = ThreadPublisher::new(&config)?;

    let err = publisher
        .publish(&sample_digest(2))
        .await
        .expect_err("no token");
    assert!(matches!(err, PublishError::MissingCredential(_)));
    Ok(())
}

#[tokio::test]
async fn test_thread_publisher_reports_rejection() -> Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let token_env = "NEWS_DIGEST_TEST_REJECTED_TOKEN";
    std::env::set_var(token_env, "test-token");
    let publisher = ThreadPublisher::new(&SocialConfig {
        enabled: true,
        api_base: server.uri(),
        token_env: token_env.to_string(),
        post_delay: 0.0,
        ..SocialConfig::default()
    })?;

    let err = publisher
        .publish(&sample_digest(1))
        .await
        .expect_err("rejected");
    assert!(matches!(err, PublishError::Rejected { status: 403, .. }));
    Ok(())
}

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_git_site_publisher_commits_content() -> Result<()> {
    init_tracing();
    if !git_available() {
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let status = std::process::Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(dir.path())
        .status()?;
    assert!(status.success());

    let publisher = GitSitePublisher::new(&GitSiteConfig {
        enabled: true,
        repo_path: dir.path().to_path_buf(),
        push: false,
        top_articles: 1,
        ..GitSiteConfig::default()
    });
    let digest = sample_digest(2);

    let receipt = publisher.publish(&digest).await?;
    assert_eq!(receipt.channel, "git_site");
    assert!(receipt.locations.iter().any(|l| l.starts_with("commit ")));
    assert!(dir.path().join("content/newsletters/latest.md").exists());
    assert!(dir.path().join("README.md").exists());

    // Publishing the same digest again has nothing to commit.
    let again = publisher.publish(&digest).await?;
    assert!(!again.locations.iter().any(|l| l.starts_with("commit ")));
    Ok(())
}

#[tokio::test]
async fn test_git_site_publisher_needs_checkout() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let publisher = GitSitePublisher::new(&GitSiteConfig {
        enabled: true,
        repo_path: dir.path().join("missing"),
        push: false,
        ..GitSiteConfig::default()
    });

    let err = publisher
        .publish(&sample_digest(1))
        .await
        .expect_err("not a checkout");
    assert!(matches!(err, PublishError::Git { .. }));
    Ok(())
}
