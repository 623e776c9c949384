use crate::cache::{fingerprint, DedupCache};
use crate::config::PipelineConfig;
use crate::digest::DigestComposer;
use crate::fetcher::HttpFetcher;
use crate::llm_adapter::{summarizer_from_config, ExtractiveSummarizer};
use crate::metrics::append_metrics;
use crate::publishers::publishers_from_config;
use crate::registry::SourceRegistry;
use crate::retry::RetryPolicy;
use crate::scheduler::FetchScheduler;
use crate::scoring::QualityScorer;
use crate::sources::default_adapters;
use crate::traits::{PublishReceipt, Publisher, Summarizer};
use crate::trends::TrendAggregator;
use crate::types::{
    DigestDocument, DigestError, RawArticle, Result, RunMetrics, ScoredArticle, SourceDescriptor,
    Stage, SummarizationError, Summary,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of one run. `Failed` is only reachable from `Idle`, when setup
/// finds a configuration problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Filtering,
    Summarizing,
    Aggregating,
    Composing,
    Publishing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full run: publish, then persist the cache.
    Publish,
    /// Stops after composing. No publisher runs and the cache file is left alone.
    Preview,
}

/// How a completed run ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Sources produced articles but none made it into the digest.
    EmptyDigest,
    /// No source produced a single article.
    NothingFetched,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::EmptyDigest => 2,
            RunOutcome::NothingFetched => 1,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub states: Vec<RunState>,
    pub outcome: RunOutcome,
    /// The digest exactly as publishers received it.
    pub digest: DigestDocument,
    /// Final metrics, including publish results and end time.
    pub metrics: RunMetrics,
    pub receipts: Vec<PublishReceipt>,
}

/// Collaborators resolved once per pipeline, either injected or built from
/// the configuration.
struct Stages {
    registry: SourceRegistry,
    scheduler: FetchScheduler,
    scorer: QualityScorer,
    summarizer: Arc<dyn Summarizer>,
    summarize_policy: RetryPolicy<SummarizationError>,
    trends: TrendAggregator,
    composer: DigestComposer,
    publishers: Vec<Arc<dyn Publisher>>,
}

/// Builder for [`Pipeline`]. Anything not injected is created from the
/// configuration when the first run starts.
pub struct PipelineBuilder {
    config: PipelineConfig,
    sources: Option<Vec<SourceDescriptor>>,
    scheduler: Option<FetchScheduler>,
    summarizer: Option<Arc<dyn Summarizer>>,
    publishers: Option<Vec<Arc<dyn Publisher>>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            sources: None,
            scheduler: None,
            summarizer: None,
            publishers: None,
        }
    }

    pub fn sources(mut self, sources: Vec<SourceDescriptor>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn scheduler(mut self, scheduler: FetchScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.get_or_insert_with(Vec::new).push(publisher);
        self
    }

    pub fn publishers(mut self, publishers: Vec<Arc<dyn Publisher>>) -> Self {
        self.publishers = Some(publishers);
        self
    }

    pub fn build(self, cache: &mut DedupCache) -> Pipeline<'_> {
        Pipeline {
            config: self.config,
            cache,
            sources: self.sources,
            scheduler: self.scheduler,
            summarizer: self.summarizer,
            publishers: self.publishers,
            stages: None,
            state: RunState::Idle,
        }
    }
}

/// Runs fetch, filter, summarize, aggregate, compose and publish for one
/// niche. The dedup cache is borrowed for the pipeline's lifetime; the
/// pipeline is its only writer.
pub struct Pipeline<'c> {
    config: PipelineConfig,
    cache: &'c mut DedupCache,
    sources: Option<Vec<SourceDescriptor>>,
    scheduler: Option<FetchScheduler>,
    summarizer: Option<Arc<dyn Summarizer>>,
    publishers: Option<Vec<Arc<dyn Publisher>>>,
    stages: Option<Stages>,
    state: RunState,
}

/// Current state plus every state entered during the run.
struct Transitions {
    run_id: String,
    current: RunState,
    history: Vec<RunState>,
}

impl Transitions {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            current: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    fn enter(&mut self, next: RunState) {
        debug!("Run {}: {:?} -> {:?}", self.run_id, self.current, next);
        self.current = next;
        self.history.push(next);
    }
}

impl<'c> Pipeline<'c> {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// State reached by the most recent run.
    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self, mode: RunMode) -> Result<RunReport> {
        self.run_at(mode, Utc::now()).await
    }

    /// Runs with an explicit clock for scoring, cache expiry and digest dating.
    /// Configuration errors found before fetching leave the pipeline `Failed`
    /// and are returned; every other failure is recorded in the run metrics.
    pub async fn run_at(&mut self, mode: RunMode, now: DateTime<Utc>) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut transitions = Transitions::new(&run_id);
        info!("Starting run {} for niche '{}' ({:?})", run_id, self.config.niche, mode);

        if let Err(e) = self.prepare(mode) {
            error!("Run {} cannot start: {}", run_id, e);
            transitions.enter(RunState::Failed);
            self.state = RunState::Failed;
            return Err(e);
        }

        let Some(stages) = self.stages.as_ref() else {
            return Err(DigestError::Config("pipeline stages not initialised".to_string()));
        };

        let report = execute(
            &self.config,
            &mut *self.cache,
            stages,
            mode,
            now,
            run_id,
            transitions,
        )
        .await;
        self.state = report.state;
        Ok(report)
    }

    fn prepare(&mut self, mode: RunMode) -> Result<()> {
        if self.stages.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let registry = match self.sources.take() {
            Some(sources) => SourceRegistry::new(sources)?,
            None => SourceRegistry::from_config(&self.config)?,
        };
        if registry.is_empty() {
            return Err(DigestError::Config("no sources configured".to_string()));
        }

        let scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => {
                let mut scheduler = FetchScheduler::new(
                    HttpFetcher::new(&self.config.scraping)?,
                    RetryPolicy::for_fetch(&self.config.scraping),
                    self.config.scraping.max_concurrent_sources,
                );
                for adapter in default_adapters() {
                    scheduler.register_adapter(adapter);
                }
                scheduler
            }
        };

        let summarizer = match self.summarizer.take() {
            Some(summarizer) => summarizer,
            None => match summarizer_from_config(
                &self.config.summarization,
                &self.config.niche,
                &self.config.quality.keywords,
            ) {
                Ok(summarizer) => summarizer,
                Err(DigestError::Config(reason)) if mode == RunMode::Preview => {
                    warn!("{}; previewing with the extractive summarizer", reason);
                    Arc::new(ExtractiveSummarizer::new(self.config.quality.keywords.clone()))
                }
                Err(e) => return Err(e),
            },
        };

        let publishers = match self.publishers.take() {
            Some(publishers) => publishers,
            None => publishers_from_config(&self.config.publishing)?,
        };

        info!(
            "Pipeline ready: {} sources, summarizer {}, {} publishers",
            registry.len(),
            summarizer.name(),
            publishers.len()
        );

        self.stages = Some(Stages {
            registry,
            scheduler,
            scorer: QualityScorer::new(self.config.quality.clone()),
            summarizer,
            summarize_policy: RetryPolicy::for_summarization(&self.config.summarization),
            trends: TrendAggregator::new(&self.config.trends, &self.config.quality.keywords),
            composer: DigestComposer::new(self.config.niche.clone()),
            publishers,
        });
        Ok(())
    }
}

async fn execute(
    config: &PipelineConfig,
    cache: &mut DedupCache,
    stages: &Stages,
    mode: RunMode,
    now: DateTime<Utc>,
    run_id: String,
    mut transitions: Transitions,
) -> RunReport {
    let deadline = Instant::now() + config.run.timeout();
    let mut metrics = RunMetrics::new(run_id.clone(), now);

    if let Some(warning) = cache.load_warning() {
        metrics.record_error(Stage::Cache, warning.to_string());
    }
    cache.purge_expired(now);

    transitions.enter(RunState::Fetching);
    let fetched = fetch_stage(stages, deadline, &mut metrics).await;
    metrics.articles_scraped = fetched.len();

    transitions.enter(RunState::Filtering);
    let scored = filter_stage(config, cache, stages, fetched, now, &mut metrics);

    transitions.enter(RunState::Summarizing);
    let summaries = summarize_stage(config, stages, &scored, deadline, &mut metrics).await;
    metrics.articles_summarized = summaries.len();

    transitions.enter(RunState::Aggregating);
    let topics = stages.trends.aggregate(&summaries);
    debug!("Found {} trend topics", topics.len());

    transitions.enter(RunState::Composing);
    let digest = stages
        .composer
        .compose(&run_id, now, scored, summaries, topics, metrics.clone());

    // Only stories that reached the digest are remembered; anything cut off by
    // the deadline or the provider quota stays eligible for the next run.
    if mode == RunMode::Publish {
        for entry in &digest.entries {
            cache.record(&entry.article.article, now);
        }
    }

    let mut receipts = Vec::new();
    if mode == RunMode::Publish {
        transitions.enter(RunState::Publishing);
        receipts = publish_stage(stages, &digest, &mut metrics).await;
        if !receipts.is_empty() {
            metrics.articles_published = digest.entries.len();
        }

        if let Err(e) = cache.flush() {
            error!("Failed to persist cache: {}", e);
            metrics.record_error(Stage::Cache, e.to_string());
        }
    } else {
        info!("Preview mode: skipping {} publishers", stages.publishers.len());
    }

    metrics.end_time = Some(Utc::now());
    if let Err(e) = append_metrics(&config.metrics.path, &metrics).await {
        warn!("Failed to write run metrics to {}: {}", config.metrics.path.display(), e);
        metrics.record_error(Stage::Metrics, e.to_string());
    }
    transitions.enter(RunState::Done);

    let outcome = if metrics.articles_scraped == 0 {
        RunOutcome::NothingFetched
    } else if digest.is_empty() {
        RunOutcome::EmptyDigest
    } else {
        RunOutcome::Success
    };
    match outcome {
        RunOutcome::Success => info!(
            "Run {} finished with {} digest entries",
            run_id,
            digest.entries.len()
        ),
        RunOutcome::EmptyDigest => warn!("Run {} produced an empty digest", run_id),
        RunOutcome::NothingFetched => error!("Run {} fetched nothing from any source", run_id),
    }

    RunReport {
        state: transitions.current,
        states: transitions.history,
        outcome,
        digest,
        metrics,
        receipts,
    }
}

/// Collects articles from every source until the stream ends or the run
/// deadline passes. Articles come back in registry order regardless of which
/// source finished first.
async fn fetch_stage(stages: &Stages, deadline: Instant, metrics: &mut RunMetrics) -> Vec<RawArticle> {
    let sources = stages.registry.sources();
    let order: HashMap<&str, usize> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (s.display_name.as_str(), i))
        .collect();

    let mut per_source: Vec<(usize, Vec<RawArticle>)> = Vec::new();
    let mut pending = sources.len();
    let mut stream = Box::pin(stages.scheduler.fetch_all(sources));

    loop {
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(fetch)) => {
                pending -= 1;
                match fetch.result {
                    Ok(articles) => {
                        let index = order.get(fetch.source_name.as_str()).copied().unwrap_or(usize::MAX);
                        per_source.push((index, articles));
                    }
                    Err(e) => {
                        metrics.record_error(Stage::Fetch, format!("{}: {}", fetch.source_name, e));
                    }
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!("Run deadline reached with {} sources still fetching", pending);
                metrics.record_error(
                    Stage::Fetch,
                    format!("run timeout reached with {} sources outstanding", pending),
                );
                break;
            }
        }
    }

    per_source.sort_by_key(|(index, _)| *index);
    per_source.into_iter().flat_map(|(_, articles)| articles).collect()
}

/// Drops duplicates (within the run and against the cache), then scores and
/// applies the admission cap.
fn filter_stage(
    config: &PipelineConfig,
    cache: &DedupCache,
    stages: &Stages,
    fetched: Vec<RawArticle>,
    now: DateTime<Utc>,
    metrics: &mut RunMetrics,
) -> Vec<ScoredArticle> {
    let mut seen = HashSet::new();
    let mut fresh = Vec::new();
    for article in fetched {
        if !seen.insert(fingerprint(&article)) || cache.is_duplicate(&article, now) {
            debug!("Duplicate: {}", article.url);
            metrics.articles_deduplicated_out += 1;
            continue;
        }
        fresh.push(article);
    }

    let scored = stages
        .scorer
        .score_all(&fresh, now, config.summarization.max_articles_per_run);
    metrics.articles_quality_rejected = scored.iter().filter(|a| !a.admitted).count();

    info!(
        "Filtering kept {} of {} articles ({} duplicates, {} rejected)",
        scored.len() - metrics.articles_quality_rejected,
        metrics.articles_scraped,
        metrics.articles_deduplicated_out,
        metrics.articles_quality_rejected
    );
    scored
}

/// Summarizes admitted articles with bounded concurrency. Once the provider
/// reports an exhausted quota, no further calls are started.
async fn summarize_stage(
    config: &PipelineConfig,
    stages: &Stages,
    scored: &[ScoredArticle],
    deadline: Instant,
    metrics: &mut RunMetrics,
) -> Vec<Summary> {
    let quota_exhausted = AtomicBool::new(false);
    let quota_exhausted = &quota_exhausted;
    let summarizer = stages.summarizer.as_ref();
    let policy = &stages.summarize_policy;

    let admitted: Vec<&RawArticle> = scored.iter().filter(|a| a.admitted).map(|a| &a.article).collect();
    let total = admitted.len();

    let mut results = stream::iter(admitted)
        .map(|article| async move {
            if quota_exhausted.load(Ordering::SeqCst) {
                return (article, None);
            }
            let label = format!("summary of {}", article.url);
            let attempted = policy.run(&label, || summarizer.summarize(article)).await;
            if let Err(e) = &attempted.result {
                if e.is_quota_exhausted() {
                    quota_exhausted.store(true, Ordering::SeqCst);
                }
            }
            (article, Some(attempted.result))
        })
        .buffer_unordered(config.summarization.max_concurrency.max(1));

    let mut summaries = Vec::new();
    let mut skipped = 0;
    let mut finished = 0;
    loop {
        match tokio::time::timeout_at(deadline, results.next()).await {
            Ok(Some((article, outcome))) => {
                finished += 1;
                match outcome {
                    Some(Ok(summary)) => summaries.push(summary),
                    Some(Err(e)) => {
                        warn!("Summarization failed for {}: {}", article.url, e);
                        metrics.record_error(Stage::Summarize, format!("{}: {}", article.url, e));
                    }
                    None => skipped += 1,
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!("Run deadline reached with {} summaries outstanding", total - finished);
                metrics.record_error(
                    Stage::Summarize,
                    format!("run timeout reached with {} summaries outstanding", total - finished),
                );
                break;
            }
        }
    }

    if skipped > 0 {
        metrics.record_error(
            Stage::Summarize,
            format!("provider quota exhausted; skipped {} articles", skipped),
        );
    }
    info!("Summarized {} of {} admitted articles", summaries.len(), total);
    summaries
}

/// Hands the digest to every publisher in turn. A failing channel is recorded
/// and the rest still run.
async fn publish_stage(
    stages: &Stages,
    digest: &DigestDocument,
    metrics: &mut RunMetrics,
) -> Vec<PublishReceipt> {
    let mut receipts = Vec::new();
    for publisher in &stages.publishers {
        let channel = publisher.channel();
        match publisher.publish(digest).await {
            Ok(receipt) => {
                info!("Published to {} ({} locations)", channel, receipt.locations.len());
                receipts.push(receipt);
            }
            Err(e) => {
                error!("Publishing to {} failed: {}", channel, e);
                metrics.record_error(Stage::Publish, format!("{}: {}", channel, e));
            }
        }
    }
    receipts
}
