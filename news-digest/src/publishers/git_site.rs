use crate::config::GitSiteConfig;
use crate::publishers::write_digest_files;
use crate::traits::{PublishReceipt, Publisher};
use crate::types::{DigestDocument, PublishError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

const COMMIT_AUTHOR_NAME: &str = "news-digest";
const COMMIT_AUTHOR_EMAIL: &str = "news-digest@localhost";

/// Commits the digest into a local checkout of a static-site repository and
/// optionally pushes it.
pub struct GitSitePublisher {
    repo_path: PathBuf,
    remote: String,
    branch: String,
    push: bool,
    top_articles: usize,
}

impl GitSitePublisher {
    pub fn new(config: &GitSiteConfig) -> Self {
        Self {
            repo_path: config.repo_path.clone(),
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            push: config.push,
            top_articles: config.top_articles,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, PublishError> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(PublishError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr: format!("{}{}", stdout, stderr).trim().to_string(),
        })
    }

    fn readme(digest: &DigestDocument) -> String {
        format!(
            "# {niche} News Digest\n\n\
             *Automatically updated by news-digest*\n\n\
             Last updated: {updated}\n\n\
             ## Latest Newsletter\n\n\
             [{title}](./content/newsletters/latest.md)\n\n\
             ## Archives\n\n\
             - [Newsletters](./content/newsletters/)\n\
             - [Articles](./content/articles/)\n",
            niche = digest.niche,
            updated = digest.generated_at.format("%B %d, %Y at %H:%M UTC"),
            title = digest.title,
        )
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.repo_path).unwrap_or(path)
    }
}

#[async_trait]
impl Publisher for GitSitePublisher {
    fn channel(&self) -> String {
        "git_site".to_string()
    }

    async fn publish(&self, digest: &DigestDocument) -> Result<PublishReceipt, PublishError> {
        if !self.repo_path.join(".git").exists() {
            return Err(PublishError::Git {
                command: "status".to_string(),
                stderr: format!("{} is not a git checkout", self.repo_path.display()),
            });
        }

        let content = self.repo_path.join("content");
        let written = write_digest_files(&content, digest, self.top_articles).await?;
        tokio::fs::write(self.repo_path.join("README.md"), Self::readme(digest)).await?;

        self.git(&["add", "content", "README.md"]).await?;

        let message = format!(
            "Update {} news digest - {}",
            digest.niche,
            digest.generated_at.format("%Y-%m-%d")
        );
        let name_cfg = format!("user.name={}", COMMIT_AUTHOR_NAME);
        let email_cfg = format!("user.email={}", COMMIT_AUTHOR_EMAIL);
        let committed = match self
            .git(&["-c", &name_cfg, "-c", &email_cfg, "commit", "-m", &message])
            .await
        {
            Ok(_) => true,
            Err(PublishError::Git { stderr, .. }) if stderr.contains("nothing to commit") => {
                info!("Site repository already up to date");
                false
            }
            Err(e) => return Err(e),
        };

        let mut locations: Vec<String> = written
            .iter()
            .map(|p| self.relative(p).display().to_string())
            .collect();
        locations.push("README.md".to_string());

        if committed {
            let head = self.git(&["rev-parse", "HEAD"]).await?;
            locations.push(format!("commit {}", head.trim()));

            if self.push {
                self.git(&["push", &self.remote, &self.branch]).await?;
                info!("Pushed digest to {}/{}", self.remote, self.branch);
            }
        }

        info!("Published digest to site repository {}", self.repo_path.display());
        Ok(PublishReceipt {
            channel: self.channel(),
            locations,
        })
    }
}
