use crate::fetcher::ThrottledClient;
use crate::types::{
    DigestDocument, FetchError, PublishError, RawArticle, SourceDescriptor, SourceKind,
    SummarizationError, Summary,
};
use async_trait::async_trait;

/// Turns one source descriptor into raw articles. One implementation per
/// source kind.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// All requests for `source` must go through `client` so the per-source
    /// delay holds.
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        client: &ThrottledClient,
    ) -> std::result::Result<Vec<RawArticle>, FetchError>;
}

/// Produces a structured summary for one admitted article.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> String;

    async fn summarize(&self, article: &RawArticle) -> std::result::Result<Summary, SummarizationError>;
}

/// One output channel for a composed digest.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn channel(&self) -> String;

    async fn publish(&self, digest: &DigestDocument) -> std::result::Result<PublishReceipt, PublishError>;
}

/// What a publisher produced: file paths, post ids, commit ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub channel: String,
    pub locations: Vec<String>,
}
