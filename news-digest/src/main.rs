use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use news_digest::digest::render_newsletter;
use news_digest::{
    ConfigOverrides, DedupCache, Pipeline, PipelineConfig, RunMode, RunOutcome, SourceFilter,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "news-digest")]
#[command(about = "Fetch, filter, summarize and publish a niche news digest")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Compose the digest and print it without publishing or saving the cache
    #[arg(long)]
    preview: bool,

    /// Override the configured niche
    #[arg(long)]
    niche: Option<String>,

    /// Override the per-run article cap
    #[arg(long)]
    max_articles: Option<usize>,

    /// Restrict the run to one kind of source
    #[arg(long, value_enum, default_value_t = SourceFilter::All)]
    sources: SourceFilter,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or maintain the dedup cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show entry counts
    Stats,
    /// Drop expired entries
    Purge,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = PipelineConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(Commands::Cache(command)) = &cli.command {
        config.validate()?;
        return cache_command(&config, command);
    }

    config.apply_overrides(&ConfigOverrides {
        niche: cli.niche.clone(),
        max_articles: cli.max_articles,
        sources: cli.sources,
    });

    let mode = if cli.preview {
        RunMode::Preview
    } else {
        RunMode::Publish
    };

    config.validate()?;
    let mut cache = DedupCache::open(&config.cache.directory, config.cache.ttl_days);
    let mut pipeline = Pipeline::builder(config).build(&mut cache);
    let report = pipeline.run(mode).await?;

    if mode == RunMode::Preview {
        println!("{}", render_newsletter(&report.digest));
    }
    for receipt in &report.receipts {
        info!("{}: {}", receipt.channel, receipt.locations.join(", "));
    }
    for err in &report.metrics.errors {
        info!("[{}] {}", err.stage, err.message);
    }

    if report.outcome != RunOutcome::Success {
        info!("Run ended with outcome {:?}", report.outcome);
    }
    Ok(report.outcome.exit_code())
}

fn cache_command(config: &PipelineConfig, command: &CacheCommand) -> Result<u8> {
    let now = Utc::now();
    let mut cache = DedupCache::open(&config.cache.directory, config.cache.ttl_days);
    if let Some(warning) = cache.load_warning() {
        error!("{}", warning);
    }

    match command {
        CacheCommand::Stats => {
            let stats = cache.stats(now);
            println!("Entries: {}", stats.total);
            println!("Expired: {}", stats.expired);
            match stats.oldest_first_seen {
                Some(oldest) => println!("Oldest:  {}", oldest.format("%Y-%m-%d %H:%M UTC")),
                None => println!("Oldest:  -"),
            }
        }
        CacheCommand::Purge => {
            let purged = cache.purge_expired(now);
            cache.flush().context("writing cache")?;
            println!("Purged {} expired entries, {} remain", purged, cache.len());
        }
    }
    Ok(0)
}
