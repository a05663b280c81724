//! Bounded-concurrency worker pool with cooperative cancellation.
//!
//! Workers pull keys from a shared channel and push completions back to the
//! coordinating thread, which consumes them as they finish; no ordering
//! guarantee is made between tasks. The coordinator performs all state
//! mutation and persistence serially in its sink closure, so checkpoint
//! state needs no locks.
//!
//! Cancellation is cooperative: raising the token stops undispatched keys
//! from starting (they short-circuit as [`TaskOutcome::Aborted`]) and is
//! surfaced to in-flight fetches as a best-effort stop request; tasks
//! already running are allowed to settle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

/// Shared cancellation signal, passed explicitly into every task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One completion yielded by the pool.
#[derive(Debug)]
pub enum TaskOutcome<K, T> {
    /// The task ran; `result` is whatever the task returned.
    Done { key: K, result: T },
    /// The abort signal was already raised when the key was dispatched; no
    /// request was made.
    Aborted { key: K },
}

/// Runs `task` over `keys` with at most `concurrency` workers, feeding each
/// completion to `sink` on the calling thread in completion order.
///
/// `sink` errors are remembered and returned after the pool drains; workers
/// are not torn down mid-flight.
pub fn run_pool<K, T, F, S>(
    keys: Vec<K>,
    concurrency: usize,
    cancel: &CancelToken,
    task: F,
    mut sink: S,
) -> Result<()>
where
    K: Send,
    T: Send,
    F: Fn(&K) -> T + Sync,
    S: FnMut(TaskOutcome<K, T>) -> Result<()>,
{
    let concurrency = concurrency.max(1);
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<K>();
    for key in keys {
        // The receiver outlives this loop; send cannot fail here.
        let _ = job_tx.send(key);
    }
    drop(job_tx);

    let (out_tx, out_rx) = crossbeam_channel::unbounded::<TaskOutcome<K, T>>();
    let mut sink_result = Ok(());

    std::thread::scope(|scope| {
        for _ in 0..concurrency {
            let job_rx = job_rx.clone();
            let out_tx = out_tx.clone();
            let cancel = cancel.clone();
            let task = &task;
            scope.spawn(move || {
                while let Ok(key) = job_rx.recv() {
                    let outcome = if cancel.is_cancelled() {
                        TaskOutcome::Aborted { key }
                    } else {
                        let result = task(&key);
                        TaskOutcome::Done { key, result }
                    };
                    if out_tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        // Coordinator loop: all mutation happens here, serially.
        while let Ok(outcome) = out_rx.recv() {
            if sink_result.is_ok() {
                sink_result = sink(outcome);
            }
        }
    });

    sink_result
}
