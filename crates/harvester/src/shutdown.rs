//! Shutdown coordination: why the run ended, the final summary, exit status.

use std::fmt;
use std::process::ExitCode;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::metrics::MetricsSnapshot;

/// The terminal edge taken by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// The consecutive-duplicate streak reached the threshold: source drained.
    DuplicateThreshold,
    /// Operator interrupt.
    Interrupted,
    /// The circuit breaker opened after sustained fetch failure.
    SourceUnavailable,
    /// Every worker went away.
    PoolClosed,
}

impl ShutdownReason {
    /// True for the edges that end the process with a success status.
    pub fn is_success(&self) -> bool {
        matches!(self, ShutdownReason::DuplicateThreshold | ShutdownReason::Interrupted)
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ShutdownReason::DuplicateThreshold => "duplicate limit reached",
            ShutdownReason::Interrupted => "interrupted",
            ShutdownReason::SourceUnavailable => "source unavailable",
            ShutdownReason::PoolClosed => "all workers stopped",
        };
        f.write_str(text)
    }
}

/// Final summary of a graceful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Why the run ended
    pub reason: ShutdownReason,
    /// Distinct fingerprints known at exit
    pub total_unique: usize,
    /// Unique fragments committed during this run
    pub committed: u64,
    /// Fragments processed during this run
    pub processed: u64,
    /// Duplicates seen during this run
    pub duplicates: u64,
    /// Pipeline counters at exit
    pub metrics: MetricsSnapshot,
}

impl Summary {
    /// Process exit status for this summary.
    pub fn exit_code(&self) -> ExitCode {
        if self.reason.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, shutting down. Total records: {} ({} new this run)",
            self.reason, self.total_unique, self.committed
        )
    }
}

/// Resolves when the operator interrupts the process (Ctrl-C / SIGINT).
///
/// If the handler cannot be installed the future never resolves, leaving the
/// duplicate threshold as the only way out.
pub async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install interrupt handler: {}", e);
        std::future::pending::<()>().await;
    }
}
