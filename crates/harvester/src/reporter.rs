//! Periodic throughput reporting.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Per-interval counters owned by the collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalCounters {
    /// Fragments processed since the last report
    pub processed: u64,
}

/// One periodic report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Distinct fingerprints known
    pub total_unique: usize,
    /// Current consecutive-duplicate streak
    pub duplicate_streak: u64,
    /// Fragments processed during the interval
    pub processed: u64,
    /// `processed` divided by the interval length
    pub per_sec: f64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {} / duplicates {} ({:.1} records/sec)",
            self.total_unique, self.duplicate_streak, self.per_sec
        )
    }
}

/// Fixed-period observer of the collector's counters.
#[derive(Debug, Clone)]
pub struct Reporter {
    interval: Duration,
}

impl Reporter {
    /// Reporter with the given period.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Ticker whose first tick fires one full period from now.
    pub fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Build a report and reset the per-interval counters.
    pub fn report(
        &self,
        counters: &mut IntervalCounters,
        total_unique: usize,
        duplicate_streak: u64,
    ) -> Report {
        let secs = self.interval.as_secs_f64();
        let per_sec = if secs > 0.0 {
            counters.processed as f64 / secs
        } else {
            0.0
        };
        let report = Report {
            total_unique,
            duplicate_streak,
            processed: counters.processed,
            per_sec,
        };
        *counters = IntervalCounters::default();
        report
    }
}
