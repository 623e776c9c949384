use crate::types::{DigestError, Result, SelectorSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Longest accepted cache retention, ten years.
pub const MAX_TTL_DAYS: i64 = 3650;
pub const MAX_RUN_TIMEOUT_SECS: u64 = 86_400;

/// Seconds from configuration as a `Duration`. Values `validate` would reject
/// become zero.
pub fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Top-level pipeline configuration, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_niche")]
    pub niche: String,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub trends: TrendConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub run: RunConfig,
    /// Consumed by whatever schedules the binary; the pipeline only reads it.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_niche() -> String {
    "AI".to_string()
}

fn default_max_articles() -> usize {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub rss_feeds: Vec<RssFeedEntry>,
    #[serde(default)]
    pub web_scraping: Vec<WebScrapeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssFeedEntry {
    pub name: Option<String>,
    pub url: String,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    #[serde(default)]
    pub fetch_full_content: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebScrapeEntry {
    pub name: Option<String>,
    pub url: String,
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    #[serde(default)]
    pub fetch_full_content: bool,
    pub selectors: SelectorSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Seconds between two requests made on behalf of the same source.
    pub rate_limit_delay: f64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
    pub max_attempts: u32,
    pub base_delay: f64,
    pub backoff_multiplier: f64,
    pub max_delay: f64,
    pub max_concurrent_sources: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay: 1.0,
            timeout: 30,
            user_agent: "news-digest/0.1 (+https://github.com/summarena)".to_string(),
            max_attempts: 3,
            base_delay: 1.0,
            backoff_multiplier: 2.0,
            max_delay: 30.0,
            max_concurrent_sources: 4,
        }
    }
}

impl ScrapingConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        seconds(self.rate_limit_delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Extractive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Name of the environment variable holding the provider key.
    pub api_key_env: String,
    pub api_base: String,
    /// Approximate input budget per article, in tokens.
    pub token_budget: usize,
    pub max_output_tokens: u32,
    pub max_articles_per_run: usize,
    pub max_concurrency: usize,
    pub max_attempts: u32,
    pub base_delay: f64,
    pub max_delay: f64,
    pub timeout: u64,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: "claude-3-opus-20240229".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_base: "https://api.anthropic.com".to_string(),
            token_budget: 3000,
            max_output_tokens: 1024,
            max_articles_per_run: 20,
            max_concurrency: 5,
            max_attempts: 3,
            base_delay: 4.0,
            max_delay: 10.0,
            timeout: 60,
        }
    }
}

impl SummarizationConfig {
    /// Reads the provider key from the environment. The value is never logged.
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        match self.provider {
            ProviderKind::Extractive => Ok(None),
            ProviderKind::Anthropic => match std::env::var(&self.api_key_env) {
                Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
                _ => Err(DigestError::Config(format!(
                    "environment variable {} is not set",
                    self.api_key_env
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_content_length: usize,
    /// An article is admitted when its score is strictly greater than this.
    pub min_score: f64,
    pub keywords: Vec<String>,
    pub title_keyword_weight: f64,
    pub body_keyword_weight: f64,
    /// Articles older than this get no recency bonus. Zero disables recency.
    pub recency_window_hours: f64,
    pub recency_max_bonus: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_content_length: 100,
            min_score: 0.0,
            keywords: Vec::new(),
            title_keyword_weight: 1.0,
            body_keyword_weight: 0.5,
            recency_window_hours: 48.0,
            recency_max_bonus: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("cache"),
            ttl_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Minimum number of distinct articles a term must appear in.
    pub min_articles: usize,
    pub max_topics: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_articles: 2,
            max_topics: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    pub markdown: MarkdownConfig,
    pub social: SocialConfig,
    pub git_site: GitSiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    /// How many top entries also get a standalone article file.
    pub top_articles: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("output"),
            top_articles: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    pub enabled: bool,
    pub api_base: String,
    pub token_env: String,
    pub newsletter_url: Option<String>,
    pub max_post_length: usize,
    pub thread_marker: String,
    pub post_delay: f64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.twitter.com/2".to_string(),
            token_env: "TWITTER_BEARER_TOKEN".to_string(),
            newsletter_url: None,
            max_post_length: 280,
            thread_marker: "🧵".to_string(),
            post_delay: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSiteConfig {
    pub enabled: bool,
    pub repo_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub push: bool,
    pub top_articles: usize,
}

impl Default for GitSiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_path: PathBuf::from("site_repo"),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            push: true,
            top_articles: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub path: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("metrics/runs.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock budget for one run, in seconds.
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { timeout_secs: 900 }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub frequency: String,
    pub time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            frequency: "daily".to_string(),
            time: "09:00".to_string(),
        }
    }
}

/// Which source kinds take part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SourceFilter {
    #[default]
    All,
    Rss,
    Web,
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub niche: Option<String>,
    pub max_articles: Option<usize>,
    pub sources: SourceFilter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            niche: default_niche(),
            sources: SourcesConfig::default(),
            scraping: ScrapingConfig::default(),
            summarization: SummarizationConfig::default(),
            quality: QualityConfig::default(),
            cache: CacheConfig::default(),
            trends: TrendConfig::default(),
            publishing: PublishingConfig::default(),
            metrics: MetricsConfig::default(),
            run: RunConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let raw = std::fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| DigestError::Config(format!("invalid YAML: {}", e)))
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(niche) = &overrides.niche {
            self.niche = niche.clone();
        }
        if let Some(max) = overrides.max_articles {
            self.summarization.max_articles_per_run = max;
        }
        match overrides.sources {
            SourceFilter::All => {}
            SourceFilter::Rss => self.sources.web_scraping.clear(),
            SourceFilter::Web => self.sources.rss_feeds.clear(),
        }
    }

    /// Checks value ranges. Source definitions are checked by the registry.
    pub fn validate(&self) -> Result<()> {
        fn fail(msg: &str) -> Result<()> {
            Err(DigestError::Config(msg.to_string()))
        }
        // Delays become `Duration`s, which panic on negative, NaN or infinite seconds.
        fn finite_non_negative(value: f64) -> bool {
            value.is_finite() && value >= 0.0
        }

        if self.niche.trim().is_empty() {
            return fail("niche must not be empty");
        }

        let s = &self.scraping;
        if s.max_attempts == 0 {
            return fail("scraping.max_attempts must be at least 1");
        }
        if ![s.rate_limit_delay, s.base_delay, s.max_delay]
            .into_iter()
            .all(finite_non_negative)
        {
            return fail("scraping delays must be finite and non-negative");
        }
        if !(s.backoff_multiplier.is_finite() && s.backoff_multiplier >= 1.0) {
            return fail("scraping.backoff_multiplier must be >= 1.0");
        }
        if s.timeout == 0 {
            return fail("scraping.timeout must be positive");
        }
        if s.max_concurrent_sources == 0 {
            return fail("scraping.max_concurrent_sources must be at least 1");
        }

        let m = &self.summarization;
        if m.token_budget == 0 {
            return fail("summarization.token_budget must be positive");
        }
        if m.max_articles_per_run == 0 {
            return fail("summarization.max_articles_per_run must be at least 1");
        }
        if m.max_concurrency == 0 {
            return fail("summarization.max_concurrency must be at least 1");
        }
        if m.max_attempts == 0 {
            return fail("summarization.max_attempts must be at least 1");
        }
        if !(finite_non_negative(m.base_delay) && finite_non_negative(m.max_delay)) {
            return fail("summarization delays must be finite and non-negative");
        }

        let q = &self.quality;
        if !(finite_non_negative(q.recency_window_hours) && finite_non_negative(q.recency_max_bonus)) {
            return fail("quality recency settings must be finite and non-negative");
        }

        if !finite_non_negative(self.publishing.social.post_delay) {
            return fail("publishing.social.post_delay must be finite and non-negative");
        }

        if !(1..=MAX_TTL_DAYS).contains(&self.cache.ttl_days) {
            return fail("cache.ttl_days must be between 1 and 3650");
        }
        if self.trends.min_articles == 0 {
            return fail("trends.min_articles must be at least 1");
        }
        if !(1..=MAX_RUN_TIMEOUT_SECS).contains(&self.run.timeout_secs) {
            return fail("run.timeout_secs must be between 1 and 86400");
        }

        Ok(())
    }
}
