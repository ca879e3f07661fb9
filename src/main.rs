// circles command-line entry point.
// Reads documents through the cache and prefetches images, for manual checks against a live store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use circles::cache::{HttpImageSource, ImagePrefetcher};
use circles::{CacheOptions, Config, DocumentPath, DocumentQuery, FetchPhase, RestStore, logging};

#[derive(Debug, Parser)]
#[command(name = "circles", version, about = "Cached document reads for the circles app")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a document and print it as JSON
    Get {
        /// Document path, e.g. circles/abc
        path: String,
        /// Number of loads to issue
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Delay between loads in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Bypass the cache on every load after the first
        #[arg(long)]
        reload: bool,
    },
    /// Download images into the prefetch cache
    Prefetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    match cli.command {
        Command::Get {
            path,
            repeat,
            interval_ms,
            reload,
        } => get(&config, &path, repeat, interval_ms, reload).await,
        Command::Prefetch { urls } => prefetch(&config, &urls).await,
        Command::Config => {
            let mut shown = config.clone();
            if shown.store.api_key.is_some() {
                shown.store.api_key = Some("<redacted>".to_string());
            }
            if shown.store.id_token.is_some() {
                shown.store.id_token = Some("<redacted>".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}

async fn get(config: &Config, raw: &str, repeat: u32, interval_ms: u64, reload: bool) -> Result<()> {
    let path: DocumentPath = raw.parse()?;
    let store = Arc::new(RestStore::new(&config.store)?);
    let query = DocumentQuery::new(store, CacheOptions::from(&config.cache));

    query.set_path(path.clone()).await;
    for i in 1..repeat.max(1) {
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        info!(attempt = i + 1, path = %path, "Loading again");
        if reload {
            query.reload().await;
        } else {
            query.cache().load(&path).await;
        }
    }

    query.cache().log_metrics();
    let state = query.snapshot();
    match state.phase() {
        FetchPhase::Ready => {
            if let Some(document) = state.data() {
                println!("{}", serde_json::to_string_pretty(document)?);
            }
        }
        FetchPhase::Empty => {
            warn!(path = %path, "No document at path");
            println!("null");
        }
        _ => {
            if let Some(error) = state.error {
                anyhow::bail!("Failed to load {}: {}", path, error);
            }
        }
    }
    Ok(())
}

async fn prefetch(config: &Config, urls: &[String]) -> Result<()> {
    let source = HttpImageSource::new(Duration::from_secs(config.store.timeout_secs))?;
    let images = ImagePrefetcher::new(Arc::new(source), config.cache.image_ttl_ms);

    let ready = images.prefetch_all(urls).await;
    info!(ready = ready, requested = urls.len(), "Image prefetch finished");
    if ready < urls.len() {
        anyhow::bail!("{} of {} images failed", urls.len() - ready, urls.len());
    }
    Ok(())
}
