use crate::fetcher::HttpFetcher;
use crate::retry::RetryPolicy;
use crate::traits::FetchAdapter;
use crate::types::{FetchError, RawArticle, SourceDescriptor, SourceKind};
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of fetching one source, after retries.
#[derive(Debug)]
pub struct SourceFetch {
    pub source_name: String,
    pub result: std::result::Result<Vec<RawArticle>, FetchError>,
    pub attempts: u32,
}

/// Runs fetch adapters for many sources with bounded concurrency. Each source
/// gets its own throttled client, so requests within a source are serialized
/// and spaced while distinct sources proceed in parallel.
pub struct FetchScheduler {
    adapters: HashMap<SourceKind, Arc<dyn FetchAdapter>>,
    http: HttpFetcher,
    policy: RetryPolicy<FetchError>,
    max_concurrent_sources: usize,
}

impl FetchScheduler {
    pub fn new(
        http: HttpFetcher,
        policy: RetryPolicy<FetchError>,
        max_concurrent_sources: usize,
    ) -> Self {
        Self {
            adapters: HashMap::new(),
            http,
            policy,
            max_concurrent_sources: max_concurrent_sources.max(1),
        }
    }

    pub fn register_adapter(&mut self, adapter: Arc<dyn FetchAdapter>) {
        info!("Registering fetch adapter for {} sources", adapter.kind());
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn FetchAdapter>) -> Self {
        self.register_adapter(adapter);
        self
    }

    /// Lazily fetches every source. Results arrive in completion order; the
    /// stream ends once every source has produced exactly one `SourceFetch`.
    pub fn fetch_all<'a>(
        &'a self,
        sources: &'a [SourceDescriptor],
    ) -> impl Stream<Item = SourceFetch> + 'a {
        info!(
            "Fetching {} sources ({} at a time)",
            sources.len(),
            self.max_concurrent_sources
        );
        stream::iter(sources)
            .map(move |source| self.fetch_source(source))
            .buffer_unordered(self.max_concurrent_sources)
    }

    async fn fetch_source(&self, source: &SourceDescriptor) -> SourceFetch {
        let Some(adapter) = self.adapters.get(&source.kind) else {
            error!("No adapter for source {} ({})", source.display_name, source.kind);
            return SourceFetch {
                source_name: source.display_name.clone(),
                result: Err(FetchError::NoAdapter(source.kind)),
                attempts: 0,
            };
        };

        let adapter = adapter.as_ref();
        let client = self.http.throttled();
        let client = &client;
        let label = format!("source {}", source.display_name);

        let attempted = self
            .policy
            .run(&label, || adapter.fetch(source, client))
            .await;

        let result = attempted.result.map(|mut articles| {
            articles.truncate(source.max_articles);
            articles
        });

        match &result {
            Ok(articles) => info!(
                "Fetched {} articles from {} ({} attempt(s))",
                articles.len(),
                source.display_name,
                attempted.attempts
            ),
            Err(e) => error!(
                "Giving up on {} after {} attempt(s): {}",
                source.display_name, attempted.attempts, e
            ),
        }
        debug!("Finished source {}", source.display_name);

        SourceFetch {
            source_name: source.display_name.clone(),
            result,
            attempts: attempted.attempts,
        }
    }
}
