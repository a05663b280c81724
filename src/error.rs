//! Error taxonomy for the crawl pipeline.
//!
//! Two layers: [`FetchError`] is the classified error contract of the fetch
//! collaborator (transient / rate-limited / forbidden / other), consumed by
//! the retry policy. [`CrawlError`] is the crate-wide error type everything
//! else returns.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Classified outcome of a single catalog fetch.
///
/// The classification drives retry behavior: `Transient` and `RateLimited`
/// are retried with backoff, `Forbidden` escalates to a session-wide abort,
/// everything else fails the single key without retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection reset, timeout, or a 5xx response. Retryable.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Explicit rate-limit signal (HTTP 429). Retryable, counted.
    #[error("rate limited by source")]
    RateLimited,

    /// Explicit hard block (HTTP 403). Session-fatal, never retried.
    #[error("forbidden by source")]
    Forbidden,

    /// Response arrived but could not be decoded into a record.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The fetch was short-circuited by the cancellation token.
    #[error("fetch cancelled")]
    Cancelled,

    /// Anything else. Not retried.
    #[error("fetch failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether the retry policy may re-attempt after this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited)
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("shard encode error: {0}")]
    ShardEncode(#[from] bincode::error::EncodeError),

    #[error("shard decode error: {0}")]
    ShardDecode(#[from] bincode::error::DecodeError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A discovery or fetch call failed past the retry policy.
    #[error("fetch failed for {what}: {source}")]
    Fetch {
        what: String,
        #[source]
        source: FetchError,
    },

    /// A progress or shard file exists but cannot be parsed. Recovered from
    /// locally (the affected state starts fresh); surfaced only when the
    /// caller asked for strict loading.
    #[error("corrupt checkpoint at {path}: {reason}")]
    CorruptCheckpoint { path: PathBuf, reason: String },

    /// The run was aborted by a hard block from the source.
    #[error("run aborted: source returned a hard block; wait before resuming")]
    Aborted,

    /// A term finished its crawl loop with unfinished or failed subjects.
    #[error("term {term} incomplete: {pending} subjects not completed")]
    TermIncomplete { term: String, pending: usize },
}
