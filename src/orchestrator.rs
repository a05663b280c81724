//! The coordinating flow: discovery, resume, paced fetching, checkpointing,
//! merge, and publish.
//!
//! One orchestrator drives the whole run. Per term it owns a progress
//! store and dispatches a bounded worker pool over each subject's remaining
//! keys; workers only fetch, and every mutation of progress and shard state
//! happens serially in the coordinator's completion sink, so checkpoint
//! state needs no locks. A hard block raises the shared cancellation token,
//! a final checkpoint save preserves everything fetched so far, and the run
//! ends with a failure report.

use std::collections::HashSet;

use crate::config::CrawlConfig;
use crate::constants::DATASET_DIR;
use crate::encode::Encoder;
use crate::error::{CrawlError, Result};
use crate::fetch::CatalogSource;
use crate::manifest::ManifestPublisher;
use crate::merge::merge_term;
use crate::pacing::{Pacer, RetryPolicy};
use crate::persist::write_json_atomic;
use crate::pool::{CancelToken, TaskOutcome, run_pool};
use crate::progress::{ProgressRecord, ProgressStore};
use crate::shard::save_shard;
use crate::types::{CatalogKey, TermCode};

/// Outcome of one run, across all intended terms.
#[derive(Debug, Default)]
pub struct RunReport {
    pub completed: Vec<TermCode>,
    pub failed: Vec<TermCode>,
    /// A hard block raised the abort signal during the run.
    pub aborted: bool,
}

impl RunReport {
    /// Full success: every intended term completed and nothing aborted.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.aborted && self.failed.is_empty()
    }
}

/// Drives crawls over a [`CatalogSource`] according to a [`CrawlConfig`].
pub struct Orchestrator<'a, S: CatalogSource + ?Sized> {
    config: CrawlConfig,
    source: &'a S,
    pacer: Pacer,
}

impl<'a, S: CatalogSource + ?Sized> Orchestrator<'a, S> {
    #[must_use]
    pub fn new(config: CrawlConfig, source: &'a S) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            ..RetryPolicy::default()
        };
        Self {
            config,
            source,
            pacer: Pacer::new(policy),
        }
    }

    /// Runs the full pipeline: stage the manifest, crawl every intended
    /// term, merge and publish each completed one, and promote the manifest
    /// only when everything succeeded.
    pub fn run(&self) -> Result<RunReport> {
        let terms = self.intended_terms()?;
        fs_err::create_dir_all(&self.config.data_dir)?;
        let publisher = ManifestPublisher::new(&self.config.data_dir);
        publisher.stage(&terms)?;

        let cancel = CancelToken::new();
        let mut report = RunReport::default();
        for term in &terms {
            if cancel.is_cancelled() {
                // Work after a hard block would extend the block; the
                // term's checkpoint (if any) already reflects prior runs.
                report.failed.push(term.clone());
                continue;
            }
            match self.crawl_term(term, &cancel) {
                Ok(()) => report.completed.push(term.clone()),
                Err(err) => {
                    tracing::error!(term = %term, error = %err, "term failed");
                    report.failed.push(term.clone());
                }
            }
        }
        report.aborted = cancel.is_cancelled();

        finish_manifest(&publisher, &report)?;
        let stats = self.pacer.stats();
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            aborted = report.aborted,
            requests = stats.attempts,
            retries = stats.retries,
            rate_limit_hits = stats.rate_limit_hits,
            "run finished"
        );
        Ok(report)
    }

    fn intended_terms(&self) -> Result<Vec<TermCode>> {
        if let Some(terms) = &self.config.terms {
            return Ok(terms.clone());
        }
        let terms = self.source.list_terms().map_err(|source| CrawlError::Fetch {
            what: "term discovery".into(),
            source,
        })?;
        tracing::info!(terms = terms.len(), "discovered terms");
        Ok(terms)
    }

    fn crawl_term(&self, term: &TermCode, cancel: &CancelToken) -> Result<()> {
        let term_dir = self.config.data_dir.join(term.as_str());
        let mut store = ProgressStore::load_or_create(&term_dir, term)?;

        let subjects = match store.cached_subjects() {
            Some(cached) => cached.to_vec(),
            None => {
                let discovered =
                    self.source
                        .list_subjects(term)
                        .map_err(|source| CrawlError::Fetch {
                            what: format!("subject discovery for {term}"),
                            source,
                        })?;
                store.cache_subjects(discovered.clone())?;
                discovered
            }
        };
        tracing::info!(term = %term, subjects = subjects.len(), "crawling term");

        for subject in &subjects {
            if cancel.is_cancelled() {
                break;
            }
            if store.is_completed(subject) {
                tracing::debug!(subject, "already completed; skipping");
                continue;
            }
            self.crawl_subject(term, subject, &mut store, cancel)?;
        }

        if cancel.is_cancelled() {
            return Err(CrawlError::Aborted);
        }
        let pending = subjects
            .iter()
            .filter(|subject| !store.is_completed(subject))
            .count();
        if pending > 0 {
            return Err(CrawlError::TermIncomplete {
                term: term.to_string(),
                pending,
            });
        }

        publish_dataset(&self.config, term, store)
    }

    /// Crawls one subject's remaining keys through the worker pool. All
    /// checkpoint mutation happens in the completion sink on this thread.
    fn crawl_subject(
        &self,
        term: &TermCode,
        subject: &str,
        store: &mut ProgressStore,
        cancel: &CancelToken,
    ) -> Result<()> {
        let keys = match store.cached_keys(subject) {
            Some(cached) => cached.to_vec(),
            None => {
                let discovered =
                    self.source
                        .list_keys(term, subject)
                        .map_err(|source| CrawlError::Fetch {
                            what: format!("key discovery for {term}/{subject}"),
                            source,
                        })?;
                store.cache_keys(subject, discovered.clone())?;
                discovered
            }
        };
        let total = keys.len();

        // Resume: existing shard entries define the already-done set, and
        // the encoder continues over the shard's own tables so new records
        // index consistently.
        let (mut encoder, mut records, mut done_keys) = match store.existing_records(subject)? {
            Some(shard) => {
                let done: HashSet<String> =
                    shard.records.iter().map(|course| course.0.clone()).collect();
                (Encoder::resume(shard.tables), shard.records, done)
            }
            None => (Encoder::new(), Vec::new(), HashSet::new()),
        };
        let resumed = done_keys.len();
        let remaining: Vec<CatalogKey> = keys
            .iter()
            .filter(|key| !done_keys.contains(&key.to_string()))
            .cloned()
            .collect();
        tracing::info!(
            subject,
            total,
            resumed,
            remaining = remaining.len(),
            "crawling subject"
        );

        if remaining.is_empty() {
            store.mark_completed(subject)?;
            return Ok(());
        }

        let stats_before = self.pacer.stats();
        let shard_dir = store.shard_dir().to_path_buf();
        let save_interval = self.config.save_interval.max(1);
        let mut new_since_save = 0usize;
        let mut failed_keys = 0u64;
        let mut aborted_keys = 0usize;

        run_pool(
            remaining,
            self.config.concurrency,
            cancel,
            |key| self.pacer.fetch(self.source, term, key, cancel),
            |outcome| {
                match outcome {
                    TaskOutcome::Done {
                        key,
                        result: Ok(record),
                    } => {
                        records.push(encoder.encode(&record));
                        done_keys.insert(key.to_string());
                        new_since_save += 1;
                        if new_since_save >= save_interval {
                            save_shard(&shard_dir, subject, &records, encoder.tables())?;
                            store.mark_partial(subject, done_keys.len(), total, Some(&key))?;
                            new_since_save = 0;
                        }
                    }
                    TaskOutcome::Done {
                        key,
                        result: Err(err),
                    } => {
                        failed_keys += 1;
                        tracing::warn!(key = %key, error = %err, "key abandoned");
                    }
                    TaskOutcome::Aborted { .. } => {
                        aborted_keys += 1;
                    }
                }
                Ok(())
            },
        )?;

        // Unconditional final snapshot: on finish and on abort alike, the
        // on-disk shard catches up with everything fetched.
        save_shard(&shard_dir, subject, &records, encoder.tables())?;

        let stats_after = self.pacer.stats();
        let fetched = (done_keys.len() - resumed) as u64;
        store.update_stats(|stats| {
            stats.requests += stats_after.attempts - stats_before.attempts;
            stats.retries += stats_after.retries - stats_before.retries;
            stats.rate_limit_hits += stats_after.rate_limit_hits - stats_before.rate_limit_hits;
            stats.records += fetched;
            stats.failed_keys += failed_keys;
        })?;

        if cancel.is_cancelled() {
            store.mark_partial(subject, done_keys.len(), total, None)?;
            store.mark_failed(subject)?;
            tracing::warn!(
                subject,
                fetched,
                aborted_keys,
                "subject aborted mid-flight; checkpoint preserved"
            );
            return Ok(());
        }
        if failed_keys > 0 {
            store.mark_partial(subject, done_keys.len(), total, None)?;
            tracing::warn!(subject, failed_keys, "subject left partial");
            return Ok(());
        }
        store.mark_completed(subject)
    }
}

/// Re-runs only the merge/publish phase over terms that still have shards
/// on disk. No network access; usable after a crawl that completed its
/// subjects but died before merging.
///
/// Only terms whose progress record shows every discovered subject
/// completed are published. An incomplete checkpoint is reported as a
/// failed term and left untouched, so the next crawl can still resume it.
pub fn merge_existing(config: &CrawlConfig) -> Result<RunReport> {
    let terms = local_terms(config)?;
    if terms.is_empty() {
        tracing::warn!("no term checkpoints found; nothing to merge");
        return Ok(RunReport::default());
    }
    let publisher = ManifestPublisher::new(&config.data_dir);
    publisher.stage(&terms)?;

    let mut report = RunReport::default();
    for term in &terms {
        let term_dir = config.data_dir.join(term.as_str());
        let publish = ProgressStore::load_or_create(&term_dir, term).and_then(|store| {
            let pending = pending_subjects(store.record());
            if pending > 0 {
                return Err(CrawlError::TermIncomplete {
                    term: term.to_string(),
                    pending,
                });
            }
            publish_dataset(config, term, store)
        });
        match publish {
            Ok(()) => report.completed.push(term.clone()),
            Err(err) => {
                tracing::error!(term = %term, error = %err, "merge failed");
                report.failed.push(term.clone());
            }
        }
    }
    finish_manifest(&publisher, &report)?;
    Ok(report)
}

/// Subjects a term's checkpoint still owes before its shards may be
/// merged: discovered subjects not yet completed, plus any partial or
/// failed marks. A record without a cached subject list counts as pending,
/// since nothing about the term is known to be complete.
fn pending_subjects(record: &ProgressRecord) -> usize {
    let Some(subjects) = &record.subjects else {
        return record.partial.len().max(1);
    };
    let undone = subjects
        .iter()
        .filter(|subject| !record.completed.contains(subject.as_str()))
        .count();
    undone.max(record.partial.len()).max(record.failed.len())
}

/// Terms with checkpoint state under the data dir, by directory scan.
fn local_terms(config: &CrawlConfig) -> Result<Vec<TermCode>> {
    let entries = match fs_err::read_dir(&config.data_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut terms = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.join(crate::constants::SHARD_DIR).is_dir() {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                terms.push(TermCode::new(name));
            }
        }
    }
    terms.sort();
    Ok(terms)
}

/// Merges a completed term's shards, atomically writes the dataset file,
/// then removes the now-redundant checkpoint files.
fn publish_dataset(config: &CrawlConfig, term: &TermCode, store: ProgressStore) -> Result<()> {
    let dataset = merge_term(store.shard_dir())?;
    let dataset_dir = config.data_dir.join(DATASET_DIR);
    fs_err::create_dir_all(&dataset_dir)?;
    let dataset_path = dataset_dir.join(format!("{term}.json"));
    write_json_atomic(&dataset_path, &dataset)?;
    tracing::info!(
        term = %term,
        courses = dataset.courses.len(),
        path = %dataset_path.display(),
        "term dataset published"
    );
    store.remove_checkpoint_files()
}

/// Promote only when every intended term completed; on total failure drop
/// the staged manifest, otherwise leave it for inspection. The prior
/// canonical manifest stays untouched in both failure modes.
fn finish_manifest(publisher: &ManifestPublisher, report: &RunReport) -> Result<()> {
    if report.success() {
        publisher.promote()
    } else if report.completed.is_empty() {
        publisher.discard()
    } else {
        tracing::warn!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "partial run; canonical manifest left unchanged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PartialMark;

    #[test]
    fn pending_subjects_gates_merge_readiness() {
        let mut record = ProgressRecord::default();
        assert!(
            pending_subjects(&record) > 0,
            "a record without discovery is never ready"
        );

        record.subjects = Some(vec!["CSCI".into(), "MATH".into()]);
        record.completed.insert("CSCI".into());
        assert_eq!(pending_subjects(&record), 1);

        record.completed.insert("MATH".into());
        assert_eq!(pending_subjects(&record), 0);

        record.completed.remove("MATH");
        record
            .partial
            .insert("MATH".into(), PartialMark::default());
        assert_eq!(pending_subjects(&record), 1);

        record.partial.remove("MATH");
        record.failed.insert("MATH".into());
        assert_eq!(pending_subjects(&record), 1);
    }
}
