//! Jittered pacing, retry policy, and abort escalation around the fetch
//! collaborator.
//!
//! Every attempt is preceded by a jittered delay (±[`PACING_JITTER`],
//! floored at [`MIN_PACING_DELAY_MS`]) so the crawl never hits the source
//! at a fixed, fingerprintable interval. Transient errors retry with
//! exponential backoff up to a small attempt cap; a hard block raises the
//! shared cancellation token and is returned as-is; everything else fails
//! the single key without retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, MIN_PACING_DELAY_MS,
    PACING_JITTER, RATE_LIMIT_WARN_THRESHOLD,
};
use crate::error::FetchError;
use crate::fetch::CatalogSource;
use crate::pool::CancelToken;
use crate::types::{CatalogKey, CourseRecord, TermCode};

/// What to do with a classified fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retryable; back off and try again if attempts remain.
    Retry,
    /// Fail this key, keep the run going.
    Fail,
    /// Session-fatal; raise the abort signal.
    Abort,
}

/// Composable retry policy: attempt cap, backoff schedule, and the error
/// classifier.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per key (first try plus retries).
    pub max_attempts: u32,
    /// Pacing delay before every attempt.
    pub base_delay: Duration,
    /// Floor applied after jitter.
    pub min_delay: Duration,
    /// Backoff unit; retry `n` waits `backoff_base * 2^(n-1)`, jittered.
    pub backoff_base: Duration,
    /// Jitter fraction applied to every delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            min_delay: Duration::from_millis(MIN_PACING_DELAY_MS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            jitter: PACING_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Classifies a fetch failure into a retry decision.
    #[must_use]
    pub fn classify(&self, err: &FetchError) -> RetryDecision {
        match err {
            FetchError::Transient(_) | FetchError::RateLimited => RetryDecision::Retry,
            FetchError::Forbidden => RetryDecision::Abort,
            FetchError::Malformed(_) | FetchError::Cancelled | FetchError::Other(_) => {
                RetryDecision::Fail
            }
        }
    }
}

/// Counters shared across all workers of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingStats {
    pub attempts: u64,
    pub retries: u64,
    pub rate_limit_hits: u64,
}

/// Wraps a [`CatalogSource`] with pacing, retry, and abort escalation.
/// Shared by reference across the worker pool; all state is atomic.
pub struct Pacer {
    policy: RetryPolicy,
    attempts: AtomicU64,
    retries: AtomicU64,
    rate_limit_hits: AtomicU64,
}

impl Pacer {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            rate_limit_hits: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the shared counters.
    #[must_use]
    pub fn stats(&self) -> PacingStats {
        PacingStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
        }
    }

    /// Fetches one key through the full pacing/retry pipeline.
    pub fn fetch<S: CatalogSource + ?Sized>(
        &self,
        source: &S,
        term: &TermCode,
        key: &CatalogKey,
        cancel: &CancelToken,
    ) -> std::result::Result<CourseRecord, FetchError> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            self.pace(attempt);
            self.attempts.fetch_add(1, Ordering::Relaxed);

            let err = match source.fetch(term, key, cancel) {
                Ok(record) => return Ok(record),
                Err(err) => err,
            };

            if matches!(err, FetchError::RateLimited) {
                self.note_rate_limit();
            }

            match self.policy.classify(&err) {
                RetryDecision::Retry if attempt + 1 < self.policy.max_attempts => {
                    attempt += 1;
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        key = %key,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "transient fetch failure; retrying"
                    );
                }
                RetryDecision::Retry | RetryDecision::Fail => {
                    tracing::warn!(key = %key, error = %err, "fetch failed");
                    return Err(err);
                }
                RetryDecision::Abort => {
                    tracing::error!(key = %key, "hard block from source; raising abort signal");
                    cancel.cancel();
                    return Err(err);
                }
            }
        }
    }

    /// Sleeps the pre-attempt delay: the base pacing delay for the first
    /// attempt, the exponential backoff for retries, both jittered.
    fn pace(&self, attempt: u32) {
        let nominal = if attempt == 0 {
            self.policy.base_delay
        } else {
            self.policy.backoff_base * 2u32.saturating_pow(attempt - 1)
        };
        std::thread::sleep(self.jittered(nominal));
    }

    fn jittered(&self, nominal: Duration) -> Duration {
        let jitter = self.policy.jitter;
        let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
        nominal.mul_f64(factor).max(self.policy.min_delay)
    }

    fn note_rate_limit(&self) {
        let hits = self.rate_limit_hits.fetch_add(1, Ordering::Relaxed) + 1;
        if hits == RATE_LIMIT_WARN_THRESHOLD {
            tracing::warn!(
                rate_limit_hits = hits,
                "source is rate limiting heavily; consider lowering concurrency or raising the base delay"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            min_delay: Duration::from_millis(1),
            backoff_base: Duration::from_millis(1),
            jitter: 0.3,
        }
    }

    /// Source whose first `failures` fetches return `error`, then success.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
        error: FetchError,
    }

    impl FlakySource {
        fn new(failures: u32, error: FetchError) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn record() -> CourseRecord {
            CourseRecord {
                key: CatalogKey::new("CSCI", "1100"),
                title: "T".into(),
                description: String::new(),
                prerequisites: vec![],
                corequisites: vec![],
                sections: vec![],
            }
        }
    }

    impl CatalogSource for FlakySource {
        fn list_terms(&self) -> Result<Vec<TermCode>, FetchError> {
            Ok(vec![])
        }
        fn list_subjects(&self, _: &TermCode) -> Result<Vec<String>, FetchError> {
            Ok(vec![])
        }
        fn list_keys(&self, _: &TermCode, _: &str) -> Result<Vec<CatalogKey>, FetchError> {
            Ok(vec![])
        }
        fn fetch(
            &self,
            _: &TermCode,
            _: &CatalogKey,
            _: &CancelToken,
        ) -> Result<CourseRecord, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(Self::record())
            }
        }
    }

    #[test]
    fn transient_errors_retry_until_success() {
        let source = FlakySource::new(2, FetchError::Transient("reset".into()));
        let pacer = Pacer::new(fast_policy());
        let cancel = CancelToken::new();
        let term = TermCode::new("202609");
        let key = CatalogKey::new("CSCI", "1100");

        let record = pacer.fetch(&source, &term, &key, &cancel).unwrap();
        assert_eq!(record.key, key);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(pacer.stats().retries, 2);
    }

    #[test]
    fn retries_exhaust_after_attempt_cap() {
        let source = FlakySource::new(10, FetchError::Transient("reset".into()));
        let pacer = Pacer::new(fast_policy());
        let cancel = CancelToken::new();
        let term = TermCode::new("202609");
        let key = CatalogKey::new("CSCI", "1100");

        let err = pacer.fetch(&source, &term, &key, &cancel).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(!cancel.is_cancelled(), "exhausted retries must not abort");
    }

    #[test]
    fn forbidden_raises_abort_without_retry() {
        let source = FlakySource::new(10, FetchError::Forbidden);
        let pacer = Pacer::new(fast_policy());
        let cancel = CancelToken::new();
        let term = TermCode::new("202609");
        let key = CatalogKey::new("CSCI", "1100");

        let err = pacer.fetch(&source, &term, &key, &cancel).unwrap_err();
        assert_eq!(err, FetchError::Forbidden);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn rate_limits_are_counted() {
        let source = FlakySource::new(1, FetchError::RateLimited);
        let pacer = Pacer::new(fast_policy());
        let cancel = CancelToken::new();
        let term = TermCode::new("202609");
        let key = CatalogKey::new("CSCI", "1100");

        pacer.fetch(&source, &term, &key, &cancel).unwrap();
        assert_eq!(pacer.stats().rate_limit_hits, 1);
    }

    #[test]
    fn cancelled_token_short_circuits_before_pacing() {
        let source = FlakySource::new(0, FetchError::Other("unused".into()));
        let pacer = Pacer::new(fast_policy());
        let cancel = CancelToken::new();
        cancel.cancel();
        let term = TermCode::new("202609");
        let key = CatalogKey::new("CSCI", "1100");

        let err = pacer.fetch(&source, &term, &key, &cancel).unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
