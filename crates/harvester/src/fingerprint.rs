//! Content fingerprinting: fixed-width BLAKE3 digests of fragment text

use serde::{Deserialize, Serialize};

/// Width of a fingerprint record, in memory and on disk.
pub const FINGERPRINT_LEN: usize = 16;

/// A 16-byte content hash identifying a fragment. Used as the dedup key and as
/// the on-disk record unit of the fingerprint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint of the exact bytes given (first 16 bytes of BLAKE3)
    pub fn compute(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(&hash.as_bytes()[..FINGERPRINT_LEN]);
        Fingerprint(out)
    }

    /// Return the fingerprint as a lowercase hex string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Return the raw bytes
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// One unit of extracted text: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    /// Trim surrounding whitespace; `None` if nothing is left.
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Fragment(trimmed.to_string()))
        }
    }

    /// The fragment text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fingerprint of the fragment's UTF-8 bytes
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(self.0.as_bytes())
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
