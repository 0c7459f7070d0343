//! In-memory fingerprint set, bootstrapped from the fingerprint file.
//!
//! The store has no interior locking. It is moved into the collector at startup
//! and only ever touched through the collector's `&mut self`.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::fingerprint::{Fingerprint, FINGERPRINT_LEN};

/// Outcome of reading a fingerprint file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Complete 16-byte records read
    pub records: usize,
    /// Distinct fingerprints among those records
    pub distinct: usize,
    /// Bytes of a partial trailing record that were ignored
    pub discarded_bytes: usize,
}

/// Set of fingerprints seen so far.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    seen: HashSet<Fingerprint>,
}

impl FingerprintStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Load the store from a fingerprint file.
    ///
    /// A missing file means a first run and yields an empty store. A partial
    /// trailing record is dropped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Fingerprint file not found, a new one will be created");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), "Reading fingerprints");
        let (store, report) = Self::read_from(BufReader::new(file))?;
        if report.discarded_bytes > 0 {
            warn!(
                path = %path.display(),
                discarded_bytes = report.discarded_bytes,
                "Ignoring partial trailing fingerprint record"
            );
        }
        info!(
            records = report.records,
            distinct = report.distinct,
            "Fingerprints loaded"
        );
        Ok(store)
    }

    /// Read 16-byte records from `reader` until EOF.
    pub fn read_from<R: Read>(mut reader: R) -> std::io::Result<(Self, LoadReport)> {
        let mut store = Self::new();
        let mut report = LoadReport::default();
        let mut block = [0u8; FINGERPRINT_LEN];

        loop {
            let n = fill_block(&mut reader, &mut block)?;
            if n < FINGERPRINT_LEN {
                report.discarded_bytes = n;
                break;
            }
            report.records += 1;
            store.seen.insert(Fingerprint(block));
        }

        report.distinct = store.len();
        Ok((store, report))
    }

    /// True if the fingerprint has been seen.
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    /// Insert a fingerprint. Returns true if it was not already present.
    pub fn insert(&mut self, fp: Fingerprint) -> bool {
        self.seen.insert(fp)
    }

    /// Number of distinct fingerprints.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True if no fingerprint has been recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Read until `block` is full or EOF; returns the number of bytes read.
fn fill_block<R: Read>(reader: &mut R, block: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
