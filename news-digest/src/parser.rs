use crate::types::{FetchError, RawArticle};
use crate::utils::text::strip_html;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Converts RSS/Atom documents into raw articles.
pub struct FeedParser {
    seen_urls: HashSet<String>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_urls: HashSet::new(),
        }
    }

    pub fn parse_feed(
        &mut self,
        content: &str,
        source_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawArticle>, FetchError> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| FetchError::Parse(format!("Failed to parse feed: {}", e)))?;

        let articles: Vec<RawArticle> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry, source_name, fetched_at))
            .collect();

        info!("Parsed feed {} with {} entries", source_name, articles.len());
        Ok(articles)
    }

    fn parse_entry(
        &mut self,
        entry: feed_rs::model::Entry,
        source_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> Option<RawArticle> {
        let url = entry.links.first()?.href.trim().to_string();
        if url.is_empty() {
            return None;
        }

        if !self.seen_urls.insert(url.clone()) {
            debug!("Skipping duplicate entry with URL: {}", url);
            return None;
        }

        let title = entry
            .title
            .map(|t| strip_html(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        // Prefer full content over the summary
        let raw_body = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();

        let author = entry
            .authors
            .first()
            .map(|a| a.name.trim().to_string())
            .filter(|a| !a.is_empty());

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        Some(RawArticle {
            source_name: source_name.to_string(),
            url,
            title,
            body_text: strip_html(&raw_body),
            author,
            published_at,
            fetched_at,
        })
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}
