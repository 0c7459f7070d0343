#![warn(missing_docs)]

//! harvester: poll one remote page, keep every distinct fragment it shows.
//!
//! Pipeline: Workers (fetch + extract) → channel → Collector (fingerprint → dedupe → append)
//! Restart:  fingerprint file → FingerprintStore

pub mod circuitbreaker;
pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod journal;
pub mod metrics;
pub mod pool;
pub mod ratelimit;
pub mod reporter;
pub mod retry;
pub mod shutdown;
pub mod source;
pub mod store;

pub use circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use collector::{Collector, CollectorState, Verdict};
pub use config::{FetchErrorPolicy, HarvestConfig};
pub use error::{FetchError, HarvestError};
pub use fingerprint::{Fingerprint, Fragment, FINGERPRINT_LEN};
pub use journal::HarvestLog;
pub use metrics::{HarvestMetrics, MetricsSnapshot};
pub use pool::{Inbound, PoolFault, PoolSettings, WorkerPool};
pub use ratelimit::{FetchRateLimiter, TokenBucket};
pub use reporter::{Report, Reporter};
pub use retry::{RetryConfig, RetryExecutor, RetryOutcome};
pub use shutdown::{interrupt_signal, ShutdownReason, Summary};
pub use source::{FragmentSource, HttpSource};
pub use store::{FingerprintStore, LoadReport};

use std::future::Future;
use std::sync::Arc;

/// Run against the configured HTTP source until a terminal edge is taken.
pub async fn run(config: &HarvestConfig) -> error::Result<Summary> {
    let source = HttpSource::new(
        &config.source_url,
        &config.selector,
        config.request_timeout(),
    )?;
    tracing::info!(url = %source.url(), selector = %config.selector, "Polling source");
    run_with_source(config, Arc::new(source), interrupt_signal()).await
}

/// Run the pipeline against any source, ending early when `interrupt` resolves.
///
/// Bootstraps the store, opens the log, starts the pool and hands everything to
/// the collector. Workers are cancelled once the collector returns.
pub async fn run_with_source<I>(
    config: &HarvestConfig,
    source: Arc<dyn FragmentSource>,
    interrupt: I,
) -> error::Result<Summary>
where
    I: Future<Output = ()>,
{
    config.validate()?;

    let store = FingerprintStore::load(&config.hash_file)?;
    let log = HarvestLog::open(&config.hash_file, &config.content_file)?;
    let metrics = Arc::new(HarvestMetrics::new());

    let mut collector = Collector::new(
        store,
        log,
        config.dup_threshold,
        Reporter::new(config.report_interval()),
        Arc::clone(&metrics),
    );

    let (pool, inbound) = WorkerPool::start(PoolSettings::from(config), source, metrics);
    let result = collector.run(inbound, interrupt).await;
    pool.shutdown();
    result
}
