//! Worker pool: N producers repeatedly fetch, extract and hand off fragments.
//!
//! Workers share one fragment channel of capacity 1, so a send suspends until
//! the collector has taken the previous handoff and the fetch rate follows the
//! consumer. Workers own nothing but their fetch state; they never see the
//! fingerprint store or the log files.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::{FetchErrorPolicy, HarvestConfig};
use crate::error::FetchError;
use crate::fingerprint::Fragment;
use crate::metrics::HarvestMetrics;
use crate::ratelimit::FetchRateLimiter;
use crate::retry::{RetryConfig, RetryExecutor, RetryOutcome};
use crate::source::FragmentSource;

/// Unrecoverable source condition reported by a worker.
#[derive(Debug)]
pub enum PoolFault {
    /// Strict mode: a fetch failed and the process must stop.
    Fatal {
        /// Worker that hit the error
        worker: usize,
        /// The failure
        error: FetchError,
    },
    /// Retry mode: the circuit breaker opened after sustained failure.
    SourceUnavailable {
        /// Worker whose failure opened the breaker
        worker: usize,
        /// The last failure seen
        error: FetchError,
    },
}

/// Settings for [`WorkerPool::start`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Number of workers
    pub workers: usize,
    /// Fixed pause after every iteration
    pub worker_delay: Duration,
    /// Pool-wide fetch rate, 0 for unlimited
    pub max_fetches_per_sec: u64,
    /// Reaction to fetch failures
    pub policy: FetchErrorPolicy,
    /// Backoff for the retry policy
    pub retry: RetryConfig,
    /// Breaker for the retry policy
    pub breaker: CircuitBreakerConfig,
}

impl From<&HarvestConfig> for PoolSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            workers: config.workers,
            worker_delay: config.worker_delay(),
            max_fetches_per_sec: config.max_fetches_per_sec,
            policy: config.fetch_error_policy,
            retry: config.retry.clone(),
            breaker: config.breaker.clone(),
        }
    }
}

/// Receiving ends consumed by the collector.
pub struct Inbound {
    /// Non-empty fragments in arrival order
    pub fragments: mpsc::Receiver<Fragment>,
    /// Source faults that end the run
    pub faults: mpsc::Receiver<PoolFault>,
}

/// Handle to the running workers.
pub struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct WorkerShared {
    source: Arc<dyn FragmentSource>,
    metrics: Arc<HarvestMetrics>,
    limiter: FetchRateLimiter,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    policy: FetchErrorPolicy,
    delay: Duration,
}

impl WorkerPool {
    /// Spawn `settings.workers` workers polling `source`.
    pub fn start(
        settings: PoolSettings,
        source: Arc<dyn FragmentSource>,
        metrics: Arc<HarvestMetrics>,
    ) -> (WorkerPool, Inbound) {
        let (fragment_tx, fragment_rx) = mpsc::channel(1);
        let (fault_tx, fault_rx) = mpsc::channel(settings.workers.max(1));
        let cancel = CancellationToken::new();

        let retry = match settings.policy {
            FetchErrorPolicy::Abort => RetryExecutor::no_retry(),
            FetchErrorPolicy::Retry => RetryExecutor::new(settings.retry.clone()),
        };
        let shared = Arc::new(WorkerShared {
            source,
            metrics,
            limiter: FetchRateLimiter::new(settings.max_fetches_per_sec),
            breaker: CircuitBreaker::new(settings.breaker.clone()),
            retry,
            policy: settings.policy,
            delay: settings.worker_delay,
        });

        let handles = (0..settings.workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&shared),
                    fragment_tx.clone(),
                    fault_tx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        info!(workers = settings.workers, policy = ?settings.policy, "Started workers");

        (
            WorkerPool { cancel, handles },
            Inbound {
                fragments: fragment_rx,
                faults: fault_rx,
            },
        )
    }

    /// Number of spawned workers
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if no worker was spawned
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Token cancelled when the pool shuts down
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every worker. In-flight fetches are abandoned, not drained.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for every worker task to finish.
    pub async fn join(mut self) {
        self.cancel.cancel();
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("Worker panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    id: usize,
    shared: Arc<WorkerShared>,
    fragments: mpsc::Sender<Fragment>,
    faults: mpsc::Sender<PoolFault>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "Worker started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.limiter.acquire() => {}
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = fetch_once(&shared) => outcome,
        };

        match outcome {
            RetryOutcome::Success(text) => {
                shared.metrics.record_fetch_ok();
                shared.breaker.record_success();

                match Fragment::new(&text) {
                    Some(fragment) => {
                        let sent = tokio::select! {
                            _ = cancel.cancelled() => break,
                            sent = fragments.send(fragment) => sent,
                        };
                        if sent.is_err() {
                            break;
                        }
                        shared.metrics.record_sent();
                    }
                    None => shared.metrics.record_empty(),
                }
            }
            RetryOutcome::Exhausted { last_error, attempts } => {
                shared.metrics.record_fetch_failure();
                match shared.policy {
                    FetchErrorPolicy::Abort => {
                        error!(worker = id, error = %last_error, "Fetch failed");
                        let _ = faults.send(PoolFault::Fatal { worker: id, error: last_error }).await;
                        break;
                    }
                    FetchErrorPolicy::Retry => {
                        warn!(worker = id, attempts, error = %last_error, "Fetch failed after retries");
                        if shared.breaker.record_failure() {
                            error!(worker = id, "Circuit breaker open, source unavailable");
                            let _ = faults
                                .send(PoolFault::SourceUnavailable { worker: id, error: last_error })
                                .await;
                            break;
                        }
                        if !shared.breaker.can_execute() {
                            break;
                        }
                    }
                }
            }
        }

        if !shared.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(shared.delay) => {}
            }
        }
    }

    debug!(worker = id, "Worker stopped");
}

async fn fetch_once(shared: &WorkerShared) -> RetryOutcome<String> {
    let metrics = &shared.metrics;
    shared
        .retry
        .execute(|| shared.source.fetch(), |_, _| metrics.record_retry())
        .await
}
