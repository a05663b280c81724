//! Write-through, crash-recoverable resume state for one term.
//!
//! Every mutating call persists the full progress record synchronously
//! before returning, so a crash immediately after a state-changing call
//! never loses that state. The record caches discovery results (subject
//! list, per-subject key lists) so a resumed run skips repeating discovery
//! network calls.
//!
//! Invariant: a subject in `completed` never also appears in `partial` or
//! `failed`; completed is terminal and exclusive.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{PROGRESS_FILE, SHARD_DIR};
use crate::error::{CrawlError, Result};
use crate::persist::{read_json, write_json_atomic};
use crate::shard::{Shard, load_shard};
use crate::types::{CatalogKey, TermCode};

/// Partial-completion marker for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMark {
    pub completed: usize,
    pub total: usize,
    pub last_key: Option<String>,
}

/// Aggregate counters for one term's crawl, persisted with the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub requests: u64,
    pub retries: u64,
    pub rate_limit_hits: u64,
    pub records: u64,
    pub failed_keys: u64,
}

/// The persisted unit: everything a resumed run needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub term: String,
    /// Cached subject discovery result; `None` until discovery ran once.
    pub subjects: Option<Vec<String>>,
    /// Cached per-subject key lists.
    pub key_lists: BTreeMap<String, Vec<CatalogKey>>,
    pub completed: BTreeSet<String>,
    pub partial: BTreeMap<String, PartialMark>,
    pub failed: BTreeSet<String>,
    pub stats: CrawlStats,
}

/// Handle over one term's progress file and shard directory.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    shard_dir: PathBuf,
    record: ProgressRecord,
}

impl ProgressStore {
    /// Reads the persisted record if present, tolerating and recovering from
    /// a corrupt file by starting fresh with a warning.
    pub fn load_or_create(term_dir: &Path, term: &TermCode) -> Result<Self> {
        fs_err::create_dir_all(term_dir)?;
        let path = term_dir.join(PROGRESS_FILE);
        let record = match read_json::<ProgressRecord>(&path) {
            Ok(Some(record)) => {
                tracing::info!(
                    term = %term,
                    completed = record.completed.len(),
                    partial = record.partial.len(),
                    "resuming from existing progress record"
                );
                record
            }
            Ok(None) => ProgressRecord {
                term: term.to_string(),
                ..ProgressRecord::default()
            },
            Err(CrawlError::CorruptCheckpoint { path, reason }) => {
                tracing::warn!(
                    progress.path = %path.display(),
                    reason,
                    "corrupt progress record; starting fresh"
                );
                ProgressRecord {
                    term: term.to_string(),
                    ..ProgressRecord::default()
                }
            }
            Err(err) => return Err(err),
        };
        Ok(Self {
            path,
            shard_dir: term_dir.join(SHARD_DIR),
            record,
        })
    }

    #[must_use]
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn shard_dir(&self) -> &Path {
        &self.shard_dir
    }

    #[must_use]
    pub fn cached_subjects(&self) -> Option<&[String]> {
        self.record.subjects.as_deref()
    }

    /// Persists the subject discovery result once.
    pub fn cache_subjects(&mut self, subjects: Vec<String>) -> Result<()> {
        self.record.subjects = Some(subjects);
        self.persist()
    }

    #[must_use]
    pub fn cached_keys(&self, subject: &str) -> Option<&[CatalogKey]> {
        self.record.key_lists.get(subject).map(Vec::as_slice)
    }

    /// Persists one subject's key discovery result.
    pub fn cache_keys(&mut self, subject: &str, keys: Vec<CatalogKey>) -> Result<()> {
        self.record.key_lists.insert(subject.to_string(), keys);
        self.persist()
    }

    #[must_use]
    pub fn is_completed(&self, subject: &str) -> bool {
        self.record.completed.contains(subject)
    }

    #[must_use]
    pub fn partial(&self, subject: &str) -> Option<&PartialMark> {
        self.record.partial.get(subject)
    }

    /// Records partial completion of a subject.
    pub fn mark_partial(
        &mut self,
        subject: &str,
        completed: usize,
        total: usize,
        last_key: Option<&CatalogKey>,
    ) -> Result<()> {
        self.record.partial.insert(
            subject.to_string(),
            PartialMark {
                completed,
                total,
                last_key: last_key.map(ToString::to_string),
            },
        );
        self.persist()
    }

    /// Marks a subject completed. Clears any partial or failed marker:
    /// completed is terminal and exclusive.
    pub fn mark_completed(&mut self, subject: &str) -> Result<()> {
        self.record.partial.remove(subject);
        self.record.failed.remove(subject);
        self.record.completed.insert(subject.to_string());
        self.persist()
    }

    /// Marks a subject failed (aborted mid-flight).
    pub fn mark_failed(&mut self, subject: &str) -> Result<()> {
        self.record.failed.insert(subject.to_string());
        self.persist()
    }

    /// Folds new counter values into the aggregate stats and persists.
    pub fn update_stats(&mut self, apply: impl FnOnce(&mut CrawlStats)) -> Result<()> {
        apply(&mut self.record.stats);
        self.persist()
    }

    /// Loads the subject's shard (if any); its records keyed by catalog key
    /// are the already-recorded entries a resumed run must not re-fetch.
    pub fn existing_records(&self, subject: &str) -> Result<Option<Shard>> {
        load_shard(&self.shard_dir, subject)
    }

    /// Removes the progress file and shard directory after a successful
    /// merge has replaced them with the term's dataset file.
    pub fn remove_checkpoint_files(self) -> Result<()> {
        match fs_err::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        match fs_err::remove_dir_all(&self.shard_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    /// Write-through: the full record hits disk before any mutator returns.
    fn persist(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn term() -> TermCode {
        TermCode::new("202609")
    }

    #[test]
    fn mutations_survive_reload() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ProgressStore::load_or_create(dir.path(), &term()).unwrap();
            store
                .cache_subjects(vec!["CSCI".into(), "MATH".into()])
                .unwrap();
            store
                .cache_keys("CSCI", vec![CatalogKey::new("CSCI", "1100")])
                .unwrap();
            store
                .mark_partial("CSCI", 1, 2, Some(&CatalogKey::new("CSCI", "1100")))
                .unwrap();
            store.mark_completed("MATH").unwrap();
        }

        let store = ProgressStore::load_or_create(dir.path(), &term()).unwrap();
        assert_eq!(
            store.cached_subjects(),
            Some(&["CSCI".to_string(), "MATH".to_string()][..])
        );
        assert_eq!(store.cached_keys("CSCI").map(<[_]>::len), Some(1));
        assert_eq!(store.partial("CSCI").unwrap().completed, 1);
        assert!(store.is_completed("MATH"));
    }

    #[test]
    fn completed_clears_partial_and_failed() {
        let dir = TempDir::new().unwrap();
        let mut store = ProgressStore::load_or_create(dir.path(), &term()).unwrap();
        store.mark_partial("CSCI", 3, 10, None).unwrap();
        store.mark_failed("CSCI").unwrap();
        store.mark_completed("CSCI").unwrap();

        assert!(store.is_completed("CSCI"));
        assert!(store.partial("CSCI").is_none());
        assert!(!store.record().failed.contains("CSCI"));
    }

    #[test]
    fn corrupt_progress_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        fs_err::write(dir.path().join(PROGRESS_FILE), b"]]not json[[").unwrap();
        let store = ProgressStore::load_or_create(dir.path(), &term()).unwrap();
        assert!(store.record().completed.is_empty());
        assert!(store.cached_subjects().is_none());
    }

    #[test]
    fn remove_checkpoint_files_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut store = ProgressStore::load_or_create(dir.path(), &term()).unwrap();
        store.mark_completed("CSCI").unwrap();
        fs_err::create_dir_all(store.shard_dir()).unwrap();

        store.remove_checkpoint_files().unwrap();
        assert!(!dir.path().join(PROGRESS_FILE).exists());
        assert!(!dir.path().join(SHARD_DIR).exists());
    }
}
