//! Pipeline counters shared by the workers and the collector.
//!
//! These are observation-only. Dedup decisions are made from the collector's
//! own counters, never from these.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free counters for the whole pipeline.
#[derive(Debug, Default)]
pub struct HarvestMetrics {
    fetches_ok: AtomicU64,
    fetch_failures: AtomicU64,
    retries: AtomicU64,
    empty_fragments: AtomicU64,
    fragments_sent: AtomicU64,
    unique: AtomicU64,
    duplicates: AtomicU64,
}

impl HarvestMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetch returned a response body.
    #[inline]
    pub fn record_fetch_ok(&self) {
        self.fetches_ok.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch failed for good (after any retries).
    #[inline]
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed attempt is about to be retried.
    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Extraction yielded nothing after trimming.
    #[inline]
    pub fn record_empty(&self) {
        self.empty_fragments.fetch_add(1, Ordering::Relaxed);
    }

    /// A fragment was handed to the collector.
    #[inline]
    pub fn record_sent(&self) {
        self.fragments_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// The collector committed a new fragment.
    #[inline]
    pub fn record_unique(&self) {
        self.unique.fetch_add(1, Ordering::Relaxed);
    }

    /// The collector saw a known fragment.
    #[inline]
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetches_ok: self.fetches_ok.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            empty_fragments: self.empty_fragments.load(Ordering::Relaxed),
            fragments_sent: self.fragments_sent.load(Ordering::Relaxed),
            unique: self.unique.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`HarvestMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successful fetches
    pub fetches_ok: u64,
    /// Fetches that failed after retries
    pub fetch_failures: u64,
    /// Retry attempts scheduled
    pub retries: u64,
    /// Fetches whose extracted text was empty
    pub empty_fragments: u64,
    /// Fragments handed to the collector
    pub fragments_sent: u64,
    /// Fragments committed as new
    pub unique: u64,
    /// Fragments rejected as duplicates
    pub duplicates: u64,
}
