use crate::fetcher::ThrottledClient;
use crate::sources::selectors::{element_text, CompiledSelector};
use crate::traits::FetchAdapter;
use crate::types::{FetchError, RawArticle, SelectorSet, SourceDescriptor, SourceKind};
use crate::utils::time::parse_date;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

const CONTENT_CONTAINERS: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    ".post-content",
    ".entry-content",
    ".article-body",
];

/// Scrapes sites without a feed: a listing page yields article links, each
/// article page is fetched and picked apart with the configured selectors.
#[derive(Debug, Default)]
pub struct WebPageAdapter;

impl WebPageAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Selectors of one source, compiled once per fetch.
struct PageSelectors {
    articles: CompiledSelector,
    title: CompiledSelector,
    content: CompiledSelector,
    author: Option<CompiledSelector>,
    date: Option<CompiledSelector>,
}

impl PageSelectors {
    fn compile(set: &SelectorSet) -> Result<Self, FetchError> {
        Ok(Self {
            articles: CompiledSelector::compile(&set.articles)?,
            title: CompiledSelector::compile(&set.title)?,
            content: CompiledSelector::compile(&set.content)?,
            author: set.author.as_ref().map(CompiledSelector::compile).transpose()?,
            date: set.date.as_ref().map(CompiledSelector::compile).transpose()?,
        })
    }

    /// Absolute, de-duplicated article links from a listing page.
    fn article_links(&self, listing: &str, base: &Url, limit: usize) -> Vec<Url> {
        let document = Html::parse_document(listing);
        let anchor = scraper::Selector::parse("a[href]").ok();
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in self.articles.select(&document) {
            let href = match self.articles.attribute() {
                Some(attr) => element.value().attr(attr).map(str::to_string),
                None => element.value().attr("href").map(str::to_string).or_else(|| {
                    anchor.as_ref().and_then(|a| {
                        element
                            .select(a)
                            .next()
                            .and_then(|link| link.value().attr("href"))
                            .map(str::to_string)
                    })
                }),
            };

            let Some(href) = href else { continue };
            let Ok(url) = base.join(href.trim()) else {
                debug!("Ignoring unparseable link {}", href);
                continue;
            };
            if url.scheme() != "http" && url.scheme() != "https" {
                continue;
            }
            if seen.insert(url.to_string()) {
                links.push(url);
            }
            if links.len() >= limit {
                break;
            }
        }

        links
    }

    fn extract(
        &self,
        page: &str,
        url: &str,
        source_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> Option<RawArticle> {
        let document = Html::parse_document(page);

        let title = self.title.first_value(&document)?;
        let paragraphs: Vec<String> = self
            .content
            .select(&document)
            .filter_map(|element| self.content.value_of(element))
            .collect();
        if paragraphs.is_empty() {
            return None;
        }

        let author = self.author.as_ref().and_then(|s| s.first_value(&document));
        let published_at = self.date.as_ref().and_then(|s| {
            let element = s.select(&document).next()?;
            let raw = match s.attribute() {
                Some(attr) => element.value().attr(attr).map(str::to_string),
                None => element
                    .value()
                    .attr("datetime")
                    .map(str::to_string)
                    .or_else(|| Some(element_text(element))),
            }?;
            parse_date(&raw)
        });

        Some(RawArticle {
            source_name: source_name.to_string(),
            url: url.to_string(),
            title,
            body_text: paragraphs.join("\n\n"),
            author,
            published_at,
            fetched_at,
        })
    }
}

/// Readable text of an article page: paragraphs of the main content
/// container, or of the whole page when no container is found.
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraph) = scraper::Selector::parse("p") else {
        return String::new();
    };

    let container = CONTENT_CONTAINERS
        .iter()
        .filter_map(|css| scraper::Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next());

    let paragraphs: Vec<String> = match container {
        Some(root) => root.select(&paragraph).map(element_text).collect(),
        None => document.select(&paragraph).map(element_text).collect(),
    };

    paragraphs
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl FetchAdapter for WebPageAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::WebScrape
    }

    async fn fetch(
        &self,
        source: &SourceDescriptor,
        client: &ThrottledClient,
    ) -> Result<Vec<RawArticle>, FetchError> {
        let set = source.selectors.as_ref().ok_or_else(|| FetchError::Selector {
            selector: String::new(),
            reason: format!("source {} has no selectors", source.display_name),
        })?;
        let selectors = PageSelectors::compile(set)?;
        let base = Url::parse(&source.url)?;

        info!("Scraping listing page: {}", source.url);
        let listing = client.get_text(&source.url).await?;
        let links = selectors.article_links(&listing, &base, source.max_articles);
        if links.is_empty() {
            warn!("No article links matched on {}", source.url);
        }

        let mut articles = Vec::new();
        for link in links {
            let page = match client.get_text(link.as_str()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Skipping {}: {}", link, e);
                    continue;
                }
            };
            match selectors.extract(&page, link.as_str(), &source.display_name, Utc::now()) {
                Some(article) => articles.push(article),
                None => warn!("Skipping {}: missing title or content", link),
            }
        }

        info!("Scraped {} articles from {}", articles.len(), source.display_name);
        Ok(articles)
    }
}
