pub mod git_site;
pub mod markdown;
pub mod thread;

pub use git_site::GitSitePublisher;
pub use markdown::MarkdownPublisher;
pub use thread::{compose_thread, ThreadPublisher};

use crate::config::PublishingConfig;
use crate::digest::{render_article, render_newsletter};
use crate::traits::Publisher;
use crate::types::{DigestDocument, DigestEntry, PublishError, Result};
use crate::utils::text::slugify;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Enabled publishers, in a fixed order: markdown, social, git site.
pub fn publishers_from_config(config: &PublishingConfig) -> Result<Vec<Arc<dyn Publisher>>> {
    let mut publishers: Vec<Arc<dyn Publisher>> = Vec::new();
    if config.markdown.enabled {
        publishers.push(Arc::new(MarkdownPublisher::new(&config.markdown)));
    }
    if config.social.enabled {
        publishers.push(Arc::new(ThreadPublisher::new(&config.social)?));
    }
    if config.git_site.enabled {
        publishers.push(Arc::new(GitSitePublisher::new(&config.git_site)));
    }
    info!("Enabled {} publishers", publishers.len());
    Ok(publishers)
}

pub fn newsletter_file_name(digest: &DigestDocument) -> String {
    format!(
        "{}-{}.md",
        slugify(&digest.niche),
        digest.generated_at.format("%Y-%m-%d")
    )
}

/// `<date>-<rank>-<headline slug>.md`. The rank keeps names unique when
/// headlines repeat or slugify to nothing.
pub fn article_file_name(digest: &DigestDocument, rank: usize, entry: &DigestEntry) -> String {
    let date = digest.generated_at.format("%Y-%m-%d");
    let slug = slugify(&entry.summary.headline);
    if slug.is_empty() {
        format!("{}-{:02}.md", date, rank)
    } else {
        format!("{}-{:02}-{}.md", date, rank, slug)
    }
}

/// Writes `newsletters/<name>.md`, `newsletters/latest.md` and one file per top
/// entry under `articles/`, all below `root`. Returns the written paths.
pub async fn write_digest_files(
    root: &Path,
    digest: &DigestDocument,
    top_articles: usize,
) -> std::result::Result<Vec<PathBuf>, PublishError> {
    let newsletters = root.join("newsletters");
    let articles = root.join("articles");
    tokio::fs::create_dir_all(&newsletters).await?;
    tokio::fs::create_dir_all(&articles).await?;

    let mut written = Vec::new();
    let body = render_newsletter(digest);

    let newsletter_path = newsletters.join(newsletter_file_name(digest));
    tokio::fs::write(&newsletter_path, &body).await?;
    written.push(newsletter_path);

    let latest_path = newsletters.join("latest.md");
    tokio::fs::write(&latest_path, &body).await?;
    written.push(latest_path);

    for (rank, entry) in digest.entries.iter().take(top_articles).enumerate() {
        let path = articles.join(article_file_name(digest, rank + 1, entry));
        tokio::fs::write(&path, render_article(entry)).await?;
        written.push(path);
    }

    debug!("Wrote {} files under {}", written.len(), root.display());
    Ok(written)
}
