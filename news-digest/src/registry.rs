use crate::config::PipelineConfig;
use crate::types::{DigestError, Result, SourceDescriptor, SourceKind};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Immutable set of sources for one run, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            validate_source(source)?;
            if !seen.insert(source.display_name.clone()) {
                return Err(DigestError::Config(format!(
                    "duplicate source name '{}'",
                    source.display_name
                )));
            }
        }
        Ok(Self { sources })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut sources = Vec::new();

        for feed in &config.sources.rss_feeds {
            sources.push(SourceDescriptor {
                kind: SourceKind::Rss,
                display_name: source_name(feed.name.as_deref(), &feed.url),
                url: feed.url.clone(),
                max_articles: feed.max_articles,
                fetch_full_content: feed.fetch_full_content,
                selectors: None,
            });
        }

        for site in &config.sources.web_scraping {
            sources.push(SourceDescriptor {
                kind: SourceKind::WebScrape,
                display_name: source_name(site.name.as_deref(), &site.url),
                url: site.url.clone(),
                max_articles: site.max_articles,
                fetch_full_content: site.fetch_full_content,
                selectors: Some(site.selectors.clone()),
            });
        }

        if sources.is_empty() {
            return Err(DigestError::Config("no sources configured".to_string()));
        }

        let registry = Self::new(sources)?;
        info!(
            "Registered {} sources ({} rss, {} web)",
            registry.len(),
            registry.of_kind(SourceKind::Rss).count(),
            registry.of_kind(SourceKind::WebScrape).count()
        );
        Ok(registry)
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn of_kind(&self, kind: SourceKind) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(move |s| s.kind == kind)
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.display_name == name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Falls back to the host of the url when no name is configured.
fn source_name(name: Option<&str>, url: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string()),
    }
}

fn validate_source(source: &SourceDescriptor) -> Result<()> {
    let parsed = Url::parse(&source.url).map_err(|e| {
        DigestError::Config(format!(
            "source '{}' has invalid url {}: {}",
            source.display_name, source.url, e
        ))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(DigestError::Config(format!(
            "source '{}' must use http or https",
            source.display_name
        )));
    }
    if source.max_articles == 0 {
        return Err(DigestError::Config(format!(
            "source '{}' has max_articles = 0",
            source.display_name
        )));
    }
    if source.kind == SourceKind::WebScrape && source.selectors.is_none() {
        return Err(DigestError::Config(format!(
            "web source '{}' has no selectors",
            source.display_name
        )));
    }
    debug!("Validated source {} ({})", source.display_name, source.kind);
    Ok(())
}
