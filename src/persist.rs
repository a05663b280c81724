//! Atomic file persistence helpers shared by the checkpoint and manifest
//! writers.
//!
//! Every checkpoint write goes through `AtomicWriteFile`: the bytes land in
//! a staging file, get fsynced, and replace the target by rename, so a crash
//! mid-write never leaves a torn file behind.

use std::io::Write;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CrawlError, Result};

/// Writes `bytes` to `path` atomically (staging file + fsync + rename).
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut atomic = AtomicWriteFile::options().open(path)?;
    let file = atomic.as_file_mut();
    file.write_all(bytes)?;
    file.sync_all()?;
    atomic.commit()?;
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &bytes)
}

/// Reads and parses a JSON file. Distinguishes "absent" (`Ok(None)`) from
/// "present but corrupt" (`Err(CorruptCheckpoint)`) so callers can recover
/// with a warning instead of failing the run.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs_err::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(err) => Err(CrawlError::CorruptCheckpoint {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}
