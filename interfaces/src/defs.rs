use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    WebScrape,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rss => write!(f, "rss"),
            SourceKind::WebScrape => write!(f, "web_scrape"),
        }
    }
}

/// A selector string from configuration. Strings starting with `/` are XPath,
/// everything else is CSS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }
}

impl From<String> for Selector {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('/') {
            Selector::XPath(trimmed.to_owned())
        } else {
            Selector::Css(trimmed.to_owned())
        }
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Selector::from(raw.to_owned())
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub articles: Selector,
    pub title: Selector,
    pub content: Selector,
    #[serde(default)]
    pub author: Option<Selector>,
    #[serde(default)]
    pub date: Option<Selector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub url: String,
    pub display_name: String,
    pub max_articles: usize,
    pub fetch_full_content: bool,
    pub selectors: Option<SelectorSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub source_name: String,
    /// Identity key within a run.
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub article: RawArticle,
    pub quality_score: f64,
    pub admitted: bool,
    /// Score contributions in the order they were applied.
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Url of the summarized article.
    pub article_ref: String,
    pub headline: String,
    pub synopsis: String,
    pub key_points: Vec<String>,
    pub relevance_tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTopic {
    pub term: String,
    pub article_refs: BTreeSet<String>,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub article: ScoredArticle,
    pub summary: Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Config,
    Cache,
    Fetch,
    Filter,
    Summarize,
    Aggregate,
    Compose,
    Publish,
    Metrics,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Cache => "cache",
            Stage::Fetch => "fetch",
            Stage::Filter => "filter",
            Stage::Summarize => "summarize",
            Stage::Aggregate => "aggregate",
            Stage::Compose => "compose",
            Stage::Publish => "publish",
            Stage::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub articles_scraped: usize,
    pub articles_deduplicated_out: usize,
    pub articles_quality_rejected: usize,
    pub articles_summarized: usize,
    pub articles_published: usize,
    pub errors: Vec<RunError>,
}

impl RunMetrics {
    pub fn new(run_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time,
            end_time: None,
            articles_scraped: 0,
            articles_deduplicated_out: 0,
            articles_quality_rejected: 0,
            articles_summarized: 0,
            articles_published: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, stage: Stage, message: impl Into<String>) {
        self.errors.push(RunError {
            stage,
            message: message.into(),
        });
    }

    pub fn errors_for(&self, stage: Stage) -> impl Iterator<Item = &RunError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

// Contract note:
// A DigestDocument is the only value a publisher receives. Publishers never
// see raw fetch state, so everything a channel needs to render has to be
// reachable from here. It is not modified after composition.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestDocument {
    pub run_id: String,
    pub niche: String,
    pub title: String,
    pub introduction: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<DigestEntry>,
    pub trend_topics: Vec<TrendTopic>,
    /// Metrics as of composition: no end time, nothing published yet.
    pub run_metrics: RunMetrics,
}

impl DigestDocument {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.article.article.source_name.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
