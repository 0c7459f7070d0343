//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use harvester::{FetchError, FragmentSource, HarvestConfig};
use tempfile::TempDir;

/// Source that replays a fixed script, then hangs like a slow server.
pub struct ScriptedSource {
    items: Mutex<VecDeque<Result<String, FetchError>>>,
}

impl ScriptedSource {
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn new(items: Vec<Result<String, FetchError>>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl FragmentSource for ScriptedSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let next = self.items.lock().unwrap().pop_front();
        match next {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }
}

/// Source that always fails with a retryable error.
pub struct DownSource;

#[async_trait]
impl FragmentSource for DownSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        Err(FetchError::Transport {
            url: "http://127.0.0.1:1/".to_string(),
            msg: "connection refused".to_string(),
        })
    }
}

/// Temporary data directory with a fast, single-worker config.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn hash_path(&self) -> PathBuf {
        self.dir.path().join("hash.bin")
    }

    pub fn content_path(&self) -> PathBuf {
        self.dir.path().join("quotes.txt")
    }

    pub fn config(&self, dup_threshold: u64) -> HarvestConfig {
        let mut config = HarvestConfig {
            workers: 1,
            dup_threshold,
            hash_file: self.hash_path(),
            content_file: self.content_path(),
            worker_delay_us: 0,
            ..HarvestConfig::default()
        };
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 2;
        config.retry.jitter = false;
        config
    }

    pub fn content(&self) -> String {
        std::fs::read_to_string(self.content_path()).unwrap_or_default()
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        std::fs::read(self.hash_path()).unwrap_or_default()
    }
}
