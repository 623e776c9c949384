pub mod cache;
pub mod config;
pub mod digest;
pub mod fetcher;
pub mod llm_adapter;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod publishers;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod scoring;
pub mod sources;
pub mod traits;
pub mod trends;
pub mod types;
pub mod utils;

pub use cache::DedupCache;
pub use config::{ConfigOverrides, PipelineConfig, SourceFilter};
pub use digest::DigestComposer;
pub use fetcher::{HttpFetcher, ThrottledClient};
pub use parser::FeedParser;
pub use pipeline::{Pipeline, PipelineBuilder, RunMode, RunOutcome, RunReport, RunState};
pub use registry::SourceRegistry;
pub use retry::RetryPolicy;
pub use scheduler::{FetchScheduler, SourceFetch};
pub use scoring::QualityScorer;
pub use traits::{FetchAdapter, PublishReceipt, Publisher, Summarizer};
pub use trends::TrendAggregator;
pub use types::*;
