//! Configuration values consumed by the crawl core.
//!
//! These are values, not mechanism: the binary populates them from CLI
//! flags; embedders construct them directly.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_SAVE_INTERVAL,
};
use crate::types::TermCode;

/// Tunables for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Root of the persisted layout (progress files, shards, datasets,
    /// manifests).
    pub data_dir: PathBuf,
    /// Concurrent fetch workers per term.
    pub concurrency: usize,
    /// Base pacing delay before each fetch attempt.
    pub base_delay: Duration,
    /// Shard checkpoint cadence, in newly-recorded entries.
    pub save_interval: usize,
    /// Total fetch attempts per key.
    pub max_attempts: u32,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Explicit terms to process; `None` means auto-discovery.
    pub terms: Option<Vec<TermCode>>,
}

impl CrawlConfig {
    /// Defaults for everything except the data directory.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            save_interval: DEFAULT_SAVE_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            terms: None,
        }
    }
}
