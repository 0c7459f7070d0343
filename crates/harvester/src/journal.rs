//! Append-only persistence log: a fingerprint file and a content file.
//!
//! Both files are opened once with create+append and never truncated. The
//! fingerprint file holds raw 16-byte records; the content file holds each
//! unique fragment followed by a blank line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::fingerprint::{Fingerprint, FINGERPRINT_LEN};

/// Separator written after every content record.
pub const RECORD_DELIMITER: &str = "\n\n";

/// The pair of append-only files recording fingerprints and unique content.
pub struct HarvestLog {
    fingerprints: File,
    content: File,
    appended: u64,
}

impl HarvestLog {
    /// Open (creating if absent) both log files for append.
    ///
    /// If the fingerprint file ends in a partial record, it is padded out to
    /// the next record boundary so new records stay 16-byte aligned. The
    /// padded block reads back as one unused fingerprint.
    pub fn open(fingerprint_path: &Path, content_path: &Path) -> Result<Self> {
        let content = open_append(content_path)?;
        let mut fingerprints = open_append(fingerprint_path)?;

        let padding = realign(&mut fingerprints)?;
        if padding > 0 {
            warn!(
                path = %fingerprint_path.display(),
                padding,
                "Padded partial trailing fingerprint record"
            );
        }

        debug!(
            fingerprints = %fingerprint_path.display(),
            content = %content_path.display(),
            "Opened persistence log"
        );
        Ok(Self {
            fingerprints,
            content,
            appended: 0,
        })
    }

    /// Append one 16-byte fingerprint record.
    pub fn append_fingerprint(&mut self, fp: &Fingerprint) -> Result<()> {
        self.fingerprints.write_all(fp.as_bytes())?;
        Ok(())
    }

    /// Append one content record followed by the blank-line delimiter.
    pub fn append_content(&mut self, text: &str) -> Result<()> {
        let mut record = String::with_capacity(text.len() + RECORD_DELIMITER.len());
        record.push_str(text);
        record.push_str(RECORD_DELIMITER);
        self.content.write_all(record.as_bytes())?;
        self.appended += 1;
        Ok(())
    }

    /// Content records appended through this handle.
    pub fn records_appended(&self) -> u64 {
        self.appended
    }

    /// Flush and sync both files. The handles are released on drop.
    pub fn close(&mut self) -> Result<()> {
        self.fingerprints.flush()?;
        self.content.flush()?;
        self.fingerprints.sync_all()?;
        self.content.sync_all()?;
        debug!(appended = self.appended, "Closed persistence log");
        Ok(())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append zero bytes up to the next record boundary; returns the bytes written.
fn realign(file: &mut File) -> std::io::Result<usize> {
    let partial = (file.metadata()?.len() % FINGERPRINT_LEN as u64) as usize;
    if partial == 0 {
        return Ok(0);
    }
    let padding = FINGERPRINT_LEN - partial;
    file.write_all(&[0u8; FINGERPRINT_LEN][..padding])?;
    Ok(padding)
}
