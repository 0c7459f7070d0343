//! The single-writer dedup/commit loop.
//!
//! The collector owns the fingerprint store and both log handles by value, so
//! nothing else can mutate them. One `select!` multiplexes the interrupt, the
//! fault channel, the report ticker and the fragment channel; exactly one event
//! is handled per iteration, and handling a fragment never awaits.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::{HarvestError, Result};
use crate::fingerprint::Fragment;
use crate::journal::HarvestLog;
use crate::metrics::HarvestMetrics;
use crate::pool::{Inbound, PoolFault};
use crate::reporter::{IntervalCounters, Report, Reporter};
use crate::shutdown::{ShutdownReason, Summary};
use crate::store::FingerprintStore;

/// Collector state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Waiting for or handling fragments.
    Running,
    /// Emitting a periodic report; returns to `Running`.
    Reporting,
    /// A terminal edge was taken.
    Terminated,
}

/// Decision for one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First sighting: committed to the log and the store.
    Unique,
    /// Already known.
    Duplicate {
        /// Consecutive duplicates including this one
        streak: u64,
    },
    /// Already known, and the streak reached the threshold.
    ThresholdReached {
        /// Consecutive duplicates including this one
        streak: u64,
    },
}

/// Owner of all dedup and persistence state.
pub struct Collector {
    store: FingerprintStore,
    log: HarvestLog,
    dup_threshold: u64,
    reporter: Reporter,
    metrics: Arc<HarvestMetrics>,
    interval: IntervalCounters,
    duplicate_streak: u64,
    processed: u64,
    duplicates: u64,
    committed: u64,
    state: CollectorState,
}

impl Collector {
    /// Build a collector around a bootstrapped store and an open log.
    pub fn new(
        store: FingerprintStore,
        log: HarvestLog,
        dup_threshold: u64,
        reporter: Reporter,
        metrics: Arc<HarvestMetrics>,
    ) -> Self {
        Self {
            store,
            log,
            dup_threshold,
            reporter,
            metrics,
            interval: IntervalCounters::default(),
            duplicate_streak: 0,
            processed: 0,
            duplicates: 0,
            committed: 0,
            state: CollectorState::Running,
        }
    }

    /// Dedup one fragment, committing it on first sight.
    ///
    /// The log is appended before the store is updated, so a fingerprint is only
    /// ever considered known once it is on disk.
    pub fn ingest(&mut self, fragment: &Fragment) -> Result<Verdict> {
        self.interval.processed += 1;
        self.processed += 1;

        let fp = fragment.fingerprint();
        if !self.store.contains(&fp) {
            self.log.append_fingerprint(&fp)?;
            self.log.append_content(fragment.as_str())?;
            self.store.insert(fp);
            self.duplicate_streak = 0;
            self.committed += 1;
            self.metrics.record_unique();
            debug!(fingerprint = %fp, "New fragment");
            return Ok(Verdict::Unique);
        }

        self.duplicate_streak += 1;
        self.duplicates += 1;
        self.metrics.record_duplicate();
        debug!(fingerprint = %fp, streak = self.duplicate_streak, "Duplicate fragment");

        if self.duplicate_streak >= self.dup_threshold {
            Ok(Verdict::ThresholdReached {
                streak: self.duplicate_streak,
            })
        } else {
            Ok(Verdict::Duplicate {
                streak: self.duplicate_streak,
            })
        }
    }

    /// Produce a periodic report and reset the per-interval count.
    pub fn report(&mut self) -> Report {
        self.state = CollectorState::Reporting;
        let report =
            self.reporter
                .report(&mut self.interval, self.store.len(), self.duplicate_streak);
        self.state = CollectorState::Running;
        report
    }

    /// Current consecutive-duplicate streak
    pub fn duplicate_streak(&self) -> u64 {
        self.duplicate_streak
    }

    /// Distinct fingerprints known
    pub fn total_unique(&self) -> usize {
        self.store.len()
    }

    /// Current state
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Summary for a terminal edge.
    pub fn summary(&self, reason: ShutdownReason) -> Summary {
        Summary {
            reason,
            total_unique: self.store.len(),
            committed: self.committed,
            processed: self.processed,
            duplicates: self.duplicates,
            metrics: self.metrics.snapshot(),
        }
    }

    /// Run until a terminal edge is taken.
    ///
    /// Graceful edges close the log and return a [`Summary`]. A fatal fetch
    /// fault returns the fetch error without a summary.
    pub async fn run<I>(&mut self, inbound: Inbound, interrupt: I) -> Result<Summary>
    where
        I: Future<Output = ()>,
    {
        let Inbound {
            mut fragments,
            mut faults,
        } = inbound;
        let mut ticker = self.reporter.ticker();
        let mut faults_open = true;
        tokio::pin!(interrupt);

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut interrupt => {
                    break ShutdownReason::Interrupted;
                }
                fault = faults.recv(), if faults_open => {
                    match fault {
                        Some(PoolFault::Fatal { worker, error }) => {
                            error!(worker, error = %error, "Fatal fetch error");
                            self.state = CollectorState::Terminated;
                            return Err(HarvestError::Fetch(error));
                        }
                        Some(PoolFault::SourceUnavailable { worker, error }) => {
                            error!(worker, error = %error, "Source unavailable");
                            break ShutdownReason::SourceUnavailable;
                        }
                        None => faults_open = false,
                    }
                }
                _ = ticker.tick() => {
                    let report = self.report();
                    info!(
                        total = report.total_unique,
                        duplicates = report.duplicate_streak,
                        per_sec = report.per_sec,
                        "{}", report
                    );
                }
                fragment = fragments.recv() => {
                    let Some(fragment) = fragment else {
                        break ShutdownReason::PoolClosed;
                    };
                    if let Verdict::ThresholdReached { streak } = self.ingest(&fragment)? {
                        info!(streak, "Duplicate threshold reached");
                        break ShutdownReason::DuplicateThreshold;
                    }
                }
            }
        };

        self.state = CollectorState::Terminated;
        let summary = self.summary(reason);
        self.log.close()?;
        info!(
            reason = ?summary.reason,
            total = summary.total_unique,
            committed = summary.committed,
            "{}", summary
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc;

    use crate::error::FetchError;
    use crate::fingerprint::FINGERPRINT_LEN;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self { dir: tempdir().unwrap() }
        }

        fn collector(&self, threshold: u64) -> Collector {
            let store = FingerprintStore::load(&self.hash_path()).unwrap();
            let log = HarvestLog::open(&self.hash_path(), &self.content_path()).unwrap();
            Collector::new(
                store,
                log,
                threshold,
                Reporter::new(Duration::from_secs(10)),
                Arc::new(HarvestMetrics::new()),
            )
        }

        fn hash_path(&self) -> std::path::PathBuf {
            self.dir.path().join("hash.bin")
        }

        fn content_path(&self) -> std::path::PathBuf {
            self.dir.path().join("quotes.txt")
        }

        fn content(&self) -> String {
            std::fs::read_to_string(self.content_path()).unwrap()
        }

        fn hash_len(&self) -> usize {
            std::fs::read(self.hash_path()).unwrap().len()
        }
    }

    fn frag(text: &str) -> Fragment {
        Fragment::new(text).unwrap()
    }

    #[test]
    fn test_alpha_beta_scenario() {
        let fx = Fixture::new();
        let mut collector = fx.collector(2);

        assert_eq!(collector.ingest(&frag("alpha")).unwrap(), Verdict::Unique);
        assert_eq!(collector.ingest(&frag("beta")).unwrap(), Verdict::Unique);
        assert_eq!(
            collector.ingest(&frag("alpha")).unwrap(),
            Verdict::Duplicate { streak: 1 }
        );
        assert_eq!(
            collector.ingest(&frag("alpha")).unwrap(),
            Verdict::ThresholdReached { streak: 2 }
        );

        assert_eq!(fx.content(), "alpha\n\nbeta\n\n");
        assert_eq!(fx.hash_len(), 2 * FINGERPRINT_LEN);
        assert_eq!(collector.total_unique(), 2);
    }

    #[test]
    fn test_threshold_three() {
        let fx = Fixture::new();
        let mut collector = fx.collector(3);

        assert_eq!(collector.ingest(&frag("u")).unwrap(), Verdict::Unique);
        assert!(matches!(collector.ingest(&frag("u")).unwrap(), Verdict::Duplicate { .. }));
        assert!(matches!(collector.ingest(&frag("u")).unwrap(), Verdict::Duplicate { .. }));
        assert_eq!(
            collector.ingest(&frag("u")).unwrap(),
            Verdict::ThresholdReached { streak: 3 }
        );
    }

    #[test]
    fn test_unique_resets_streak() {
        let fx = Fixture::new();
        let mut collector = fx.collector(10);

        collector.ingest(&frag("a")).unwrap();
        collector.ingest(&frag("a")).unwrap();
        collector.ingest(&frag("a")).unwrap();
        assert_eq!(collector.duplicate_streak(), 2);

        collector.ingest(&frag("b")).unwrap();
        assert_eq!(collector.duplicate_streak(), 0);
    }

    #[test]
    fn test_report_resets_interval_only() {
        let fx = Fixture::new();
        let mut collector = fx.collector(10);

        collector.ingest(&frag("a")).unwrap();
        collector.ingest(&frag("a")).unwrap();
        let report = collector.report();
        assert_eq!(report.processed, 2);
        assert_eq!(report.total_unique, 1);
        assert_eq!(report.duplicate_streak, 1);
        assert_eq!(collector.state(), CollectorState::Running);

        let report = collector.report();
        assert_eq!(report.processed, 0);
        assert_eq!(report.duplicate_streak, 1);
    }

    #[test]
    fn test_restart_recognizes_committed_fragment() {
        let fx = Fixture::new();
        {
            let mut collector = fx.collector(5);
            assert_eq!(collector.ingest(&frag("alpha")).unwrap(), Verdict::Unique);
        }

        let mut restarted = fx.collector(5);
        assert_eq!(restarted.total_unique(), 1);
        assert_eq!(
            restarted.ingest(&frag("alpha")).unwrap(),
            Verdict::Duplicate { streak: 1 }
        );
        assert_eq!(fx.content(), "alpha\n\n");
    }

    fn channels() -> (
        mpsc::Sender<Fragment>,
        mpsc::Sender<PoolFault>,
        Inbound,
    ) {
        let (ftx, frx) = mpsc::channel(1);
        let (etx, erx) = mpsc::channel(1);
        (
            ftx,
            etx,
            Inbound {
                fragments: frx,
                faults: erx,
            },
        )
    }

    #[tokio::test]
    async fn test_run_stops_at_threshold() {
        let fx = Fixture::new();
        let mut collector = fx.collector(2);
        let (ftx, _etx, inbound) = channels();

        let feeder = tokio::spawn(async move {
            for text in ["alpha", "beta", "alpha", "alpha", "alpha"] {
                if ftx.send(frag(text)).await.is_err() {
                    break;
                }
            }
        });

        let summary = collector
            .run(inbound, std::future::pending())
            .await
            .unwrap();
        feeder.await.unwrap();

        assert_eq!(summary.reason, ShutdownReason::DuplicateThreshold);
        assert_eq!(summary.total_unique, 2);
        assert_eq!(summary.processed, 4);
        assert_eq!(fx.content(), "alpha\n\nbeta\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticker_resets_interval_counts() {
        let fx = Fixture::new();
        let mut collector = fx.collector(10);
        let (ftx, _etx, inbound) = channels();

        let feeder = tokio::spawn(async move {
            for text in ["a", "b", "a"] {
                ftx.send(frag(text)).await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let interrupt = tokio::time::sleep(Duration::from_secs(15));
        let summary = collector.run(inbound, interrupt).await.unwrap();
        feeder.abort();

        assert_eq!(summary.reason, ShutdownReason::Interrupted);
        assert_eq!(summary.processed, 3);

        let report = collector.report();
        assert_eq!(report.processed, 0);
        assert_eq!(report.total_unique, 2);
        assert_eq!(report.duplicate_streak, 1);
    }

    #[tokio::test]
    async fn test_run_interrupt() {
        let fx = Fixture::new();
        let mut collector = fx.collector(2);
        let (_ftx, _etx, inbound) = channels();

        let summary = collector.run(inbound, async {}).await.unwrap();
        assert_eq!(summary.reason, ShutdownReason::Interrupted);
        assert_eq!(summary.total_unique, 0);
    }

    #[tokio::test]
    async fn test_run_fatal_fault_is_error() {
        let fx = Fixture::new();
        let mut collector = fx.collector(2);
        let (_ftx, etx, inbound) = channels();

        etx.send(PoolFault::Fatal {
            worker: 0,
            error: FetchError::Status {
                url: "http://localhost".to_string(),
                status: 500,
            },
        })
        .await
        .unwrap();

        let result = collector.run(inbound, std::future::pending()).await;
        assert!(matches!(result, Err(HarvestError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_run_source_unavailable() {
        let fx = Fixture::new();
        let mut collector = fx.collector(2);
        let (_ftx, etx, inbound) = channels();

        etx.send(PoolFault::SourceUnavailable {
            worker: 1,
            error: FetchError::Transport {
                url: "http://localhost".to_string(),
                msg: "refused".to_string(),
            },
        })
        .await
        .unwrap();

        let summary = collector.run(inbound, std::future::pending()).await.unwrap();
        assert_eq!(summary.reason, ShutdownReason::SourceUnavailable);
        assert!(!summary.reason.is_success());
    }

    #[tokio::test]
    async fn test_run_pool_closed() {
        let fx = Fixture::new();
        let mut collector = fx.collector(2);
        let (ftx, etx, inbound) = channels();
        drop(ftx);
        drop(etx);

        let summary = collector.run(inbound, std::future::pending()).await.unwrap();
        assert_eq!(summary.reason, ShutdownReason::PoolClosed);
    }
}
