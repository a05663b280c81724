#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide for pragmatic reasons:
//
// Documentation lints: internal/self-documenting functions don't need extensive docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: indices and counts in this crate are bounded by catalog sizes
// (tens of thousands of entries), far below any truncation threshold.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
//
// Style/complexity: the crawl coordinator is naturally one long loop; splitting
// it would hurt readability.
#![allow(clippy::too_many_lines)]
#![allow(clippy::similar_names)]
//
// Many functions return Result for consistency even when they currently can't
// fail, so future error conditions can be added without breaking the API.
#![allow(clippy::unnecessary_wraps)]

//! # crawldex
//!
//! Resumable crawl orchestrator and checkpointed encoding/merge pipeline for
//! large, rate-limited external catalogs.
//!
//! The crate ingests a catalog (course listings and their sections/meetings)
//! via repeated HTTP fetches and produces one compact, deduplicated dataset
//! file per term, surviving crashes, transient failures, and hard blocking by
//! the source server without losing or re-fetching completed work.
//!
//! ## Pipeline
//!
//! - [`fetch`]: the catalog source boundary, where one fetch returns a structured
//!   record or a classified error.
//! - [`pacing`]: jittered pacing, bounded exponential-backoff retry, and
//!   abort escalation on hard blocks.
//! - [`pool`]: bounded-concurrency worker pool with cooperative cancellation.
//! - [`progress`]: write-through, crash-recoverable resume state per term.
//! - [`intern`] / [`encode`]: value-interning encoder producing compact
//!   tuples over deduplicated shared tables.
//! - [`shard`]: atomic per-subject checkpoint snapshots.
//! - [`merge`]: recombines subject shards into one globally-deduplicated
//!   dataset.
//! - [`manifest`]: stages a provisional manifest and atomically promotes it
//!   only when the whole run succeeds.
//!
//! ## Guarantees
//!
//! - **Idempotent resume**: a resumed run only requests keys not already
//!   recorded in the subject's shard.
//! - **Bounded checkpoint lag**: the on-disk shard never trails the in-memory
//!   state by more than one save interval.
//! - **Atomic publish**: readers of the canonical manifest never observe a
//!   half-written or partially-updated run.

/// The crawldex crate version (matches `Cargo.toml`).
pub const CRAWLDEX_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod constants;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod intern;
pub mod manifest;
pub mod merge;
pub mod orchestrator;
pub mod pacing;
pub mod persist;
pub mod pool;
pub mod progress;
pub mod shard;
pub mod types;

pub use config::CrawlConfig;
pub use constants::*;
pub use encode::{Encoder, decode_course};
pub use error::{CrawlError, FetchError, Result};
pub use fetch::{CatalogSource, HttpCatalogSource};
pub use intern::{InternTable, PeriodValue, TableSet, canonical_minutes, minutes_from_canonical};
pub use manifest::{Manifest, ManifestEntry, ManifestPublisher};
pub use merge::{MergedDataset, merge_shards, merge_term};
pub use orchestrator::{Orchestrator, RunReport, merge_existing};
pub use pacing::{Pacer, PacingStats, RetryDecision, RetryPolicy};
pub use pool::{CancelToken, TaskOutcome, run_pool};
pub use progress::{CrawlStats, PartialMark, ProgressRecord, ProgressStore};
pub use shard::{Shard, load_all_shards, load_shard, save_shard, shard_path};
pub use types::{
    CatalogKey, CourseRecord, DateRange, EncodedCourse, EncodedMeeting, EncodedSection, Location,
    Meeting, Section, TermCode, TimePeriod,
};
