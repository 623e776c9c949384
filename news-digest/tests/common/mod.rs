#![allow(dead_code)]

// Shared fixtures for the integration tests: articles, configs and mock
// adapters/summarizers/publishers that count their calls.

pub use news_digest::config::ProviderKind;
pub use news_digest::{
    DedupCache, FetchAdapter, FetchScheduler, HttpFetcher, Pipeline, PipelineConfig,
    PublishReceipt, Publisher, RetryPolicy, RunMode, RunOutcome, RunState, Summarizer,
    ThrottledClient,
};
pub use news_digest::types::{
    DigestDocument, DigestError, FetchError, PublishError, RawArticle, ScoredArticle,
    SourceDescriptor, SourceKind, Stage, SummarizationError, Summary,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use news_digest::llm_adapter::ExtractiveSummarizer;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const KEYWORDS: &[&str] = &["LLM", "GPU", "agents"];

/// Fixed clock for every test run.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

/// A body comfortably above the default 100 character minimum.
pub fn long_body(topic: &str) -> String {
    format!(
        "Researchers published new results on {topic} this week. \
         The work compares several approaches on public benchmarks. \
         Early adopters report faster iteration and lower costs. \
         The authors plan a follow-up release next quarter."
    )
}

pub fn article(source: &str, url: &str, title: &str) -> RawArticle {
    RawArticle {
        source_name: source.to_string(),
        url: url.to_string(),
        title: title.to_string(),
        body_text: long_body(title),
        author: None,
        published_at: None,
        fetched_at: test_now(),
    }
}

pub fn article_published(source: &str, url: &str, title: &str, hours_ago: i64) -> RawArticle {
    RawArticle {
        published_at: Some(test_now() - Duration::hours(hours_ago)),
        ..article(source, url, title)
    }
}

pub fn rss_source(name: &str) -> SourceDescriptor {
    SourceDescriptor {
        kind: SourceKind::Rss,
        url: format!("https://{}.example.com/feed.xml", name),
        display_name: name.to_string(),
        max_articles: 10,
        fetch_full_content: false,
        selectors: None,
    }
}

/// Offline config: no delays, extractive summaries, no publishers, and cache
/// and metrics under `dir`.
pub fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.niche = "AI".to_string();
    config.scraping.rate_limit_delay = 0.0;
    config.scraping.base_delay = 0.0;
    config.scraping.max_delay = 0.0;
    config.scraping.max_attempts = 3;
    config.summarization.provider = ProviderKind::Extractive;
    config.summarization.base_delay = 0.0;
    config.summarization.max_delay = 0.0;
    config.quality.keywords = KEYWORDS.iter().map(|k| k.to_string()).collect();
    config.cache.directory = dir.join("cache");
    config.metrics.path = dir.join("metrics").join("runs.jsonl");
    config.publishing.markdown.enabled = false;
    config.publishing.social.enabled = false;
    config.publishing.git_site.enabled = false;
    config
}

pub fn scheduler_with(config: &PipelineConfig, adapter: Arc<dyn FetchAdapter>) -> FetchScheduler {
    FetchScheduler::new(
        HttpFetcher::new(&config.scraping).expect("http client"),
        RetryPolicy::for_fetch(&config.scraping),
        config.scraping.max_concurrent_sources,
    )
    .with_adapter(adapter)
}

pub fn extractive() -> Arc<dyn Summarizer> {
    Arc::new(ExtractiveSummarizer::new(
        KEYWORDS.iter().map(|k| k.to_string()).collect(),
    ))
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Articles(Vec<RawArticle>),
    Status(u16),
    Timeout,
    /// Sleeps, then returns the articles. Used to outlast the run deadline.
    Stall(std::time::Duration, Vec<RawArticle>),
}

/// Serves canned responses keyed by source url and counts calls per url.
pub struct MockAdapter {
    kind: SourceKind,
    responses: HashMap<String, MockResponse>,
    calls: Mutex<HashMap<String, u32>>,
    total_calls: AtomicU32,
}

impl MockAdapter {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            responses: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicU32::new(0),
        }
    }

    pub fn respond(mut self, source: &SourceDescriptor, response: MockResponse) -> Self {
        self.responses.insert(source.url.clone(), response);
        self
    }

    pub fn calls_for(&self, source: &SourceDescriptor) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&source.url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchAdapter for MockAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(
        &self,
        source: &SourceDescriptor,
        _client: &ThrottledClient,
    ) -> Result<Vec<RawArticle>, FetchError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(source.url.clone())
            .or_insert(0) += 1;

        match self.responses.get(&source.url) {
            Some(MockResponse::Articles(articles)) => Ok(articles.clone()),
            Some(MockResponse::Status(status)) => Err(FetchError::Status {
                status: *status,
                url: source.url.clone(),
            }),
            Some(MockResponse::Timeout) => Err(FetchError::Timeout {
                url: source.url.clone(),
            }),
            Some(MockResponse::Stall(delay, articles)) => {
                tokio::time::sleep(*delay).await;
                Ok(articles.clone())
            }
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SummaryFailure {
    Provider,
    Quota,
}

/// Delegates to the extractive summarizer unless the article's url is set to
/// fail.
pub struct MockSummarizer {
    inner: ExtractiveSummarizer,
    failures: HashMap<String, SummaryFailure>,
    fail_all: Option<SummaryFailure>,
    stalls: HashMap<String, std::time::Duration>,
    calls: AtomicU32,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            inner: ExtractiveSummarizer::new(KEYWORDS.iter().map(|k| k.to_string()).collect()),
            failures: HashMap::new(),
            fail_all: None,
            stalls: HashMap::new(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(mut self, url: &str, failure: SummaryFailure) -> Self {
        self.failures.insert(url.to_string(), failure);
        self
    }

    pub fn stalling(mut self, url: &str, delay: std::time::Duration) -> Self {
        self.stalls.insert(url.to_string(), delay);
        self
    }

    pub fn failing_all(mut self, failure: SummaryFailure) -> Self {
        self.fail_all = Some(failure);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn summarize(&self, article: &RawArticle) -> Result<Summary, SummarizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stalls.get(&article.url) {
            tokio::time::sleep(*delay).await;
        }
        let failure = self.failures.get(&article.url).copied().or(self.fail_all);
        match failure {
            Some(SummaryFailure::Provider) => Err(SummarizationError::Provider {
                status: Some(400),
                message: "bad request".to_string(),
            }),
            Some(SummaryFailure::Quota) => Err(SummarizationError::QuotaExhausted(
                "credit balance too low".to_string(),
            )),
            None => self.inner.summarize(article).await,
        }
    }
}

/// Records every digest it receives; optionally fails.
pub struct MockPublisher {
    channel: String,
    fail: bool,
    calls: AtomicU32,
    received: Mutex<Vec<DigestDocument>>,
}

impl MockPublisher {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            fail: false,
            calls: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(channel: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(channel)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<DigestDocument> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn channel(&self) -> String {
        self.channel.clone()
    }

    async fn publish(&self, digest: &DigestDocument) -> Result<PublishReceipt, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PublishError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.received.lock().unwrap().push(digest.clone());
        Ok(PublishReceipt {
            channel: self.channel.clone(),
            locations: vec![format!("{}://{}", self.channel, digest.run_id)],
        })
    }
}

pub fn urls(digest: &DigestDocument) -> Vec<String> {
    digest
        .entries
        .iter()
        .map(|e| e.article.article.url.clone())
        .collect()
}

pub fn distinct<T: std::hash::Hash + Eq + Clone>(items: &[T]) -> HashSet<T> {
    items.iter().cloned().collect()
}
