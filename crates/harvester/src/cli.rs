//! Command-line flags, layered over the config file

use crate::config::{FetchErrorPolicy, HarvestConfig};
use clap::Parser;
use std::path::PathBuf;

/// Command-line flags
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(about = "Poll a page, keep every distinct fragment it ever shows", long_about = None)]
pub struct Cli {
    /// Config file (.toml or .json); flags override its values
    #[arg(short, long, env = "HARVESTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of fetch workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Report interval in seconds
    #[arg(long = "timeout")]
    pub report_interval_secs: Option<u64>,

    /// Consecutive duplicates that stop the run
    #[arg(long = "dup")]
    pub dup_threshold: Option<u64>,

    /// Fingerprint file
    #[arg(long = "hashf")]
    pub hash_file: Option<PathBuf>,

    /// Content file
    #[arg(long = "quotesf")]
    pub content_file: Option<PathBuf>,

    /// Page to poll
    #[arg(long)]
    pub url: Option<String>,

    /// CSS selector of the fragment text
    #[arg(long)]
    pub selector: Option<String>,

    /// Pool-wide fetch limit per second (0 = unlimited)
    #[arg(long)]
    pub rate: Option<u64>,

    /// Exit with an error on the first failed fetch instead of retrying
    #[arg(long)]
    pub strict: bool,
}

impl Cli {
    /// Resolve the effective configuration: defaults, then file, then flags.
    pub fn into_config(self) -> anyhow::Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::from_file(path)?,
            None => HarvestConfig::default(),
        };

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(secs) = self.report_interval_secs {
            config.report_interval_secs = secs;
        }
        if let Some(dup) = self.dup_threshold {
            config.dup_threshold = dup;
        }
        if let Some(path) = self.hash_file {
            config.hash_file = path;
        }
        if let Some(path) = self.content_file {
            config.content_file = path;
        }
        if let Some(url) = self.url {
            config.source_url = url;
        }
        if let Some(selector) = self.selector {
            config.selector = selector;
        }
        if let Some(rate) = self.rate {
            config.max_fetches_per_sec = rate;
        }
        if self.strict {
            config.fetch_error_policy = FetchErrorPolicy::Abort;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::try_parse_from(["harvester"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.dup_threshold, 500);
        assert_eq!(config.fetch_error_policy, FetchErrorPolicy::Retry);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "harvester",
            "--workers",
            "8",
            "--timeout",
            "30",
            "--dup",
            "1000",
            "--hashf",
            "/tmp/h.bin",
            "--quotesf",
            "/tmp/q.txt",
            "--strict",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.report_interval_secs, 30);
        assert_eq!(config.dup_threshold, 1000);
        assert_eq!(config.hash_file, PathBuf::from("/tmp/h.bin"));
        assert_eq!(config.content_file, PathBuf::from("/tmp/q.txt"));
        assert_eq!(config.fetch_error_policy, FetchErrorPolicy::Abort);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "workers = 6\ndup_threshold = 20").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::try_parse_from(["harvester", "--config", path.as_str(), "--dup", "40"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.workers, 6);
        assert_eq!(config.dup_threshold, 40);
    }

    #[test]
    fn test_invalid_flag_value_rejected() {
        let cli = Cli::try_parse_from(["harvester", "--workers", "0"]).unwrap();
        assert!(cli.into_config().is_err());
    }
}
