use crate::types::{Result, RunMetrics};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Appends one JSON line for a finished run. Parent directories are created
/// on demand.
pub async fn append_metrics(path: impl AsRef<Path>, metrics: &RunMetrics) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(metrics)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    info!(
        "Run {}: scraped {}, duplicates {}, rejected {}, summarized {}, published {}, {} error(s), {:.1}s",
        metrics.run_id,
        metrics.articles_scraped,
        metrics.articles_deduplicated_out,
        metrics.articles_quality_rejected,
        metrics.articles_summarized,
        metrics.articles_published,
        metrics.errors.len(),
        metrics.duration_seconds().unwrap_or_default()
    );
    Ok(())
}

/// Reads back every recorded run, skipping lines that do not parse.
pub async fn read_metrics(path: impl AsRef<Path>) -> Result<Vec<RunMetrics>> {
    let raw = match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}
