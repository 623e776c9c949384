use crate::config::MarkdownConfig;
use crate::publishers::write_digest_files;
use crate::traits::{PublishReceipt, Publisher};
use crate::types::{DigestDocument, PublishError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes the digest as markdown files and keeps an index of past newsletters.
pub struct MarkdownPublisher {
    output_dir: PathBuf,
    top_articles: usize,
}

impl MarkdownPublisher {
    pub fn new(config: &MarkdownConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            top_articles: config.top_articles,
        }
    }

    /// Regenerates `index.md` from the newsletters on disk, newest first.
    async fn write_index(&self) -> Result<PathBuf, PublishError> {
        let newsletters = self.output_dir.join("newsletters");
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&newsletters).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".md") && name != "latest.md" {
                names.push(name);
            }
        }
        names.sort_by(|a, b| newsletter_date(b).cmp(newsletter_date(a)).then_with(|| a.cmp(b)));

        let mut index = String::from("# News Digest Archive\n\n");
        index.push_str("[Latest newsletter](newsletters/latest.md)\n\n## Newsletters\n\n");
        for name in &names {
            index.push_str(&format!(
                "- [{}](newsletters/{})\n",
                name.trim_end_matches(".md"),
                name
            ));
        }

        let path = self.output_dir.join("index.md");
        tokio::fs::write(&path, index).await?;
        Ok(path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Trailing `YYYY-MM-DD` of a newsletter file name.
fn newsletter_date(name: &str) -> &str {
    let stem = name.trim_end_matches(".md");
    let cut = stem.len().saturating_sub(10);
    stem.get(cut..).unwrap_or(stem)
}

#[async_trait]
impl Publisher for MarkdownPublisher {
    fn channel(&self) -> String {
        "markdown".to_string()
    }

    async fn publish(&self, digest: &DigestDocument) -> Result<PublishReceipt, PublishError> {
        let mut written = write_digest_files(&self.output_dir, digest, self.top_articles).await?;
        written.push(self.write_index().await?);

        info!(
            "Published markdown digest to {} ({} files)",
            self.output_dir.display(),
            written.len()
        );
        Ok(PublishReceipt {
            channel: self.channel(),
            locations: written.iter().map(|p| p.display().to_string()).collect(),
        })
    }
}
