//! Crate-wide defaults and on-disk layout constants.

/// Default number of concurrent fetch workers per term.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default base pacing delay before each fetch attempt, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;

/// Pacing delays never drop below this floor after jitter is applied.
pub const MIN_PACING_DELAY_MS: u64 = 50;

/// Jitter fraction applied to pacing and backoff delays (±30%).
pub const PACING_JITTER: f64 = 0.3;

/// Base delay for the exponential retry backoff, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Maximum fetch attempts per key (first attempt plus retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Rate-limit responses past this count trigger an operator warning.
pub const RATE_LIMIT_WARN_THRESHOLD: u64 = 10;

/// Shard checkpoint cadence: save after this many newly-recorded entries.
pub const DEFAULT_SAVE_INTERVAL: usize = 20;

/// Per-request HTTP timeout, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Current shard envelope format version.
///
/// Version 1 shards predate per-meeting date-range and final-exam indices and
/// are upgraded on load. See [`crate::shard`].
pub const SHARD_FORMAT_VERSION: u32 = 2;

/// Format version stamped into merged dataset files.
pub const DATASET_FORMAT_VERSION: u32 = 2;

/// Progress record file name, under `<data-dir>/<term>/`.
pub const PROGRESS_FILE: &str = "progress.json";

/// Shard directory name, under `<data-dir>/<term>/`.
pub const SHARD_DIR: &str = "shards";

/// Shard file extension.
pub const SHARD_EXT: &str = "shard";

/// Merged dataset directory name, under `<data-dir>/`.
pub const DATASET_DIR: &str = "terms";

/// Canonical manifest file name, under `<data-dir>/`.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Provisional manifest file name; promoted to canonical by atomic rename.
pub const MANIFEST_STAGING_FILE: &str = "manifest.staging.json";

/// Label interned when a merge encounters a dangling table reference in a
/// string-valued category.
pub const UNKNOWN_LABEL: &str = "Unknown";
