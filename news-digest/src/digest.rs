use crate::scoring::rank_order;
use crate::types::{
    DigestDocument, DigestEntry, RunMetrics, ScoredArticle, Summary, TrendTopic,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Number of entries rendered as "top stories".
pub const TOP_STORIES: usize = 5;

/// Assembles the digest document handed to every publisher.
#[derive(Debug, Clone)]
pub struct DigestComposer {
    niche: String,
}

impl DigestComposer {
    pub fn new(niche: impl Into<String>) -> Self {
        Self {
            niche: niche.into(),
        }
    }

    /// Pairs admitted articles with their summaries and orders them by rank.
    /// Articles without a summary are left out. Ordering does not depend on
    /// the order of the inputs.
    pub fn compose(
        &self,
        run_id: &str,
        generated_at: DateTime<Utc>,
        scored: Vec<ScoredArticle>,
        summaries: Vec<Summary>,
        trend_topics: Vec<TrendTopic>,
        run_metrics: RunMetrics,
    ) -> DigestDocument {
        let mut by_ref: HashMap<String, Summary> = summaries
            .into_iter()
            .map(|s| (s.article_ref.clone(), s))
            .collect();

        let mut admitted: Vec<ScoredArticle> = scored.into_iter().filter(|a| a.admitted).collect();
        admitted.sort_by(rank_order);

        let entries: Vec<DigestEntry> = admitted
            .into_iter()
            .filter_map(|article| {
                let summary = by_ref.remove(&article.article.url)?;
                Some(DigestEntry { article, summary })
            })
            .collect();

        debug!("Composed {} digest entries", entries.len());

        let source_count = {
            let mut names: Vec<&str> = entries
                .iter()
                .map(|e| e.article.article.source_name.as_str())
                .collect();
            names.sort_unstable();
            names.dedup();
            names.len()
        };

        let title = format!(
            "{} News Digest - {}",
            self.niche,
            generated_at.format("%B %d, %Y")
        );
        let introduction = self.introduction(entries.len(), source_count, &trend_topics);

        info!("Digest '{}' has {} entries", title, entries.len());

        DigestDocument {
            run_id: run_id.to_string(),
            niche: self.niche.clone(),
            title,
            introduction,
            generated_at,
            entries,
            trend_topics,
            run_metrics,
        }
    }

    fn introduction(&self, articles: usize, sources: usize, trends: &[TrendTopic]) -> String {
        if articles == 0 {
            return format!(
                "No new {} stories made it into today's digest.",
                self.niche
            );
        }

        let mut intro = format!(
            "Welcome to today's {} news digest! We've analyzed {} {} from {} {} to bring you the most important developments.",
            self.niche,
            articles,
            if articles == 1 { "article" } else { "articles" },
            sources,
            if sources == 1 { "source" } else { "sources" },
        );
        if !trends.is_empty() {
            let names: Vec<&str> = trends.iter().take(3).map(|t| t.term.as_str()).collect();
            intro.push_str(&format!(" Trending today: {}.", names.join(", ")));
        }
        intro
    }
}

/// Newsletter body in markdown, shared by the file-based publishers.
pub fn render_newsletter(digest: &DigestDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", digest.title));
    out.push_str(&format!(
        "*Generated {}*\n\n",
        digest.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!("{}\n\n", digest.introduction));

    if !digest.entries.is_empty() {
        out.push_str("## Top Stories\n\n");
        for (i, entry) in digest.entries.iter().take(TOP_STORIES).enumerate() {
            let article = &entry.article.article;
            out.push_str(&format!(
                "### {}. [{}]({})\n\n",
                i + 1,
                entry.summary.headline,
                article.url
            ));
            out.push_str(&format!("*{}*", byline(entry)));
            out.push_str("\n\n");
            out.push_str(&format!("{}\n\n", entry.summary.synopsis));
            if !entry.summary.key_points.is_empty() {
                out.push_str("**Key points:**\n\n");
                for point in &entry.summary.key_points {
                    out.push_str(&format!("- {}\n", point));
                }
                out.push('\n');
            }
        }
    }

    if !digest.trend_topics.is_empty() {
        out.push_str("## Trending Topics\n\n");
        for topic in &digest.trend_topics {
            out.push_str(&format!(
                "- **{}**: {} {} ({:.0}%)\n",
                topic.term,
                topic.article_refs.len(),
                if topic.article_refs.len() == 1 { "article" } else { "articles" },
                topic.strength * 100.0
            ));
        }
        out.push('\n');
    }

    if digest.entries.len() > TOP_STORIES {
        out.push_str("## More Stories\n\n");
        for entry in digest.entries.iter().skip(TOP_STORIES) {
            out.push_str(&format!(
                "- [{}]({}) ({})\n",
                entry.summary.headline, entry.article.article.url, entry.article.article.source_name
            ));
        }
        out.push('\n');
    }

    out.push_str("---\n\n");
    out.push_str(&format!(
        "*{} articles from {} sources. Run {}.*\n",
        digest.entries.len(),
        digest.source_count(),
        digest.run_id
    ));
    out
}

/// Standalone page for one digest entry.
pub fn render_article(entry: &DigestEntry) -> String {
    let article = &entry.article.article;
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", entry.summary.headline));
    out.push_str(&format!("**Source:** [{}]({})\n\n", article.source_name, article.url));
    if let Some(published) = article.published_at {
        out.push_str(&format!("**Published:** {}\n\n", published.format("%Y-%m-%d")));
    }
    if let Some(author) = &article.author {
        out.push_str(&format!("**Author:** {}\n\n", author));
    }
    out.push_str(&format!("**Quality score:** {:.2}\n\n", entry.article.quality_score));
    out.push_str("## Summary\n\n");
    out.push_str(&format!("{}\n\n", entry.summary.synopsis));
    if !entry.summary.key_points.is_empty() {
        out.push_str("## Key Points\n\n");
        for point in &entry.summary.key_points {
            out.push_str(&format!("- {}\n", point));
        }
        out.push('\n');
    }
    if !entry.summary.relevance_tags.is_empty() {
        let tags: Vec<String> = entry
            .summary
            .relevance_tags
            .iter()
            .map(|t| format!("`{}`", t))
            .collect();
        out.push_str(&format!("**Tags:** {}\n", tags.join(" ")));
    }
    out
}

fn byline(entry: &DigestEntry) -> String {
    let article = &entry.article.article;
    let mut parts = vec![article.source_name.clone()];
    if let Some(published) = article.published_at {
        parts.push(published.format("%b %d, %Y").to_string());
    }
    if let Some(author) = &article.author {
        parts.push(format!("by {}", author));
    }
    parts.join(" · ")
}
