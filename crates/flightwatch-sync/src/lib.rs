use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use flightwatch_core::load_bounds;
use flightwatch_storage::{
    CacheStore, FsFileStore, HeaderProfile, HttpClientConfig, MemoryCacheStore, RedisCacheStore,
    ReqwestHttpClient,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod config;
mod dedup;
mod detail;
mod orchestrator;
mod persist;
mod summary;
#[cfg(test)]
mod testing;
mod worker;

pub use config::{
    AbandonPolicy, CacheBackend, PollerConfig, DEFAULT_DETAIL_URL, DEFAULT_FEED_URL,
    DEFAULT_WORKER_LIMIT,
};
pub use dedup::{CycleAccumulator, CycleClaims, DedupGeneration, DedupTracker};
pub use detail::{DetailError, DetailFetcher};
pub use orchestrator::{CycleOrchestrator, CycleSummary};
pub use persist::{cache_key, PersistError, PersistedFlight, PersistenceWriter};
pub use summary::{decode_feed, SummaryError, SummaryFetcher};
pub use worker::{CycleContext, RegionOutcome, RegionWorker};

/// Wires the production collaborators described by `config` into an orchestrator. Creates the
/// data root if it is missing.
pub async fn orchestrator_from_config(config: &PollerConfig) -> Result<CycleOrchestrator> {
    let bounds = load_bounds(&config.bounds_file)?;
    if bounds.is_empty() {
        bail!("no bounds configured in {}", config.bounds_file.display());
    }

    let http = Arc::new(ReqwestHttpClient::new(HttpClientConfig {
        timeout: Duration::from_secs(config.http_timeout_secs),
        ..Default::default()
    })?);

    let cache: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Redis => Arc::new(RedisCacheStore::connect(&config.redis_url).await?),
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
    };

    let files = FsFileStore::new(&config.data_dir);
    files
        .ensure_root()
        .await
        .with_context(|| format!("preparing data dir {}", config.data_dir.display()))?;

    let headers = HeaderProfile::browser(&config.user_agent);
    let writer = Arc::new(PersistenceWriter::new(cache, Arc::new(files)));
    let summary = Arc::new(SummaryFetcher::new(
        http.clone(),
        config.feed_url.clone(),
        headers.clone(),
    ));
    let details = Arc::new(DetailFetcher::new(
        http,
        config.detail_url.clone(),
        headers,
        config.detail_retry,
        writer,
    ));
    let worker = Arc::new(RegionWorker::new(summary, details, config.abandon_policy));

    info!(
        bounds = bounds.len(),
        worker_limit = config.worker_limit,
        data_dir = %config.data_dir.display(),
        cache = ?config.cache_backend,
        "poller configured"
    );
    Ok(CycleOrchestrator::new(bounds, worker).with_worker_limit(config.worker_limit))
}

/// Polls until `cancel` fires, using configuration from the environment.
pub async fn run_from_env(cancel: CancellationToken) -> Result<u64> {
    let config = PollerConfig::from_env();
    let mut orchestrator = orchestrator_from_config(&config).await?;
    Ok(orchestrator.run(cancel).await)
}

/// Runs a single cycle, using configuration from the environment.
pub async fn run_once_from_env() -> Result<CycleSummary> {
    let config = PollerConfig::from_env();
    let mut orchestrator = orchestrator_from_config(&config).await?;
    Ok(orchestrator.run_cycle(&CancellationToken::new()).await)
}
