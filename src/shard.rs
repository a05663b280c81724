//! Per-subject checkpoint snapshots.
//!
//! A shard is one subject's persisted unit: its encoded records plus the
//! local interning tables they index into, wrapped in a versioned bincode
//! envelope. Every save is a full snapshot that atomically replaces the
//! prior file, never a diff, so the on-disk shard is always internally
//! consistent.
//!
//! Loading tolerates corruption: an unreadable shard is logged and treated
//! as absent, so the affected subject restarts fresh instead of failing the
//! run. Version-1 payloads (meetings without date-range/final-exam indices)
//! are upgraded in place on load.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{SHARD_EXT, SHARD_FORMAT_VERSION};
use crate::error::Result;
use crate::intern::TableSet;
use crate::persist::write_bytes_atomic;
use crate::types::{EncodedCourse, EncodedCourseV1};

/// One subject's persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub subject: String,
    pub saved_at: DateTime<Utc>,
    pub record_count: u32,
    pub records: Vec<EncodedCourse>,
    pub tables: TableSet,
}

/// Version-1 payload shape.
#[derive(Debug, Serialize, Deserialize)]
struct ShardV1 {
    subject: String,
    saved_at: DateTime<Utc>,
    record_count: u32,
    records: Vec<EncodedCourseV1>,
    tables: TableSet,
}

impl From<ShardV1> for Shard {
    fn from(v1: ShardV1) -> Self {
        Self {
            subject: v1.subject,
            saved_at: v1.saved_at,
            record_count: v1.record_count,
            records: v1.records.into_iter().map(EncodedCourse::from).collect(),
            tables: v1.tables,
        }
    }
}

/// On-disk envelope: the format version discriminator lives here, outside
/// the payload, so the decoder branches explicitly instead of sniffing
/// field presence.
#[derive(Debug, Serialize, Deserialize)]
struct ShardEnvelope {
    version: u32,
    payload: Vec<u8>,
}

/// Path of one subject's shard file inside `shard_dir`.
#[must_use]
pub fn shard_path(shard_dir: &Path, subject: &str) -> PathBuf {
    shard_dir.join(format!("{subject}.{SHARD_EXT}"))
}

/// Saves a full snapshot of one subject, unconditionally overwriting the
/// prior version.
pub fn save_shard(
    shard_dir: &Path,
    subject: &str,
    records: &[EncodedCourse],
    tables: &TableSet,
) -> Result<()> {
    fs_err::create_dir_all(shard_dir)?;
    let shard = Shard {
        subject: subject.to_string(),
        saved_at: Utc::now(),
        record_count: records.len() as u32,
        records: records.to_vec(),
        tables: tables.clone(),
    };
    let config = bincode::config::standard();
    let payload = bincode::serde::encode_to_vec(&shard, config)?;
    let envelope = ShardEnvelope {
        version: SHARD_FORMAT_VERSION,
        payload,
    };
    let bytes = bincode::serde::encode_to_vec(&envelope, config)?;
    write_bytes_atomic(&shard_path(shard_dir, subject), &bytes)?;
    tracing::debug!(
        shard.subject = subject,
        shard.records = records.len(),
        "shard saved"
    );
    Ok(())
}

/// Loads one subject's shard. Returns `None` when the file is absent or
/// unreadable; corruption is logged as a warning and recovered from by
/// starting the subject fresh.
pub fn load_shard(shard_dir: &Path, subject: &str) -> Result<Option<Shard>> {
    let path = shard_path(shard_dir, subject);
    let bytes = match fs_err::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    match decode_shard(&bytes) {
        Ok(mut shard) => {
            shard.tables.rehydrate();
            Ok(Some(shard))
        }
        Err(reason) => {
            tracing::warn!(
                shard.path = %path.display(),
                reason,
                "corrupt shard; subject will start fresh"
            );
            Ok(None)
        }
    }
}

fn decode_shard(bytes: &[u8]) -> std::result::Result<Shard, String> {
    let config = bincode::config::standard();
    let (envelope, _): (ShardEnvelope, usize) =
        bincode::serde::decode_from_slice(bytes, config).map_err(|err| err.to_string())?;
    match envelope.version {
        1 => {
            let (shard, _): (ShardV1, usize) =
                bincode::serde::decode_from_slice(&envelope.payload, config)
                    .map_err(|err| err.to_string())?;
            Ok(Shard::from(shard))
        }
        SHARD_FORMAT_VERSION => {
            let (shard, _): (Shard, usize) =
                bincode::serde::decode_from_slice(&envelope.payload, config)
                    .map_err(|err| err.to_string())?;
            Ok(shard)
        }
        version => Err(format!("unsupported shard format version {version}")),
    }
}

/// Lists every shard in a directory, sorted by subject for deterministic
/// merge order. Corrupt entries are skipped with a warning.
pub fn load_all_shards(shard_dir: &Path) -> Result<Vec<Shard>> {
    let mut subjects = Vec::new();
    let entries = match fs_err::read_dir(shard_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == SHARD_EXT) {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                subjects.push(stem.to_string());
            }
        }
    }
    subjects.sort_unstable();

    let mut shards = Vec::with_capacity(subjects.len());
    for subject in subjects {
        if let Some(shard) = load_shard(shard_dir, &subject)? {
            shards.push(shard);
        }
    }
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Encoder;
    use crate::types::{CatalogKey, CourseRecord};
    use tempfile::TempDir;

    fn record(subject: &str, number: &str) -> CourseRecord {
        CourseRecord {
            key: CatalogKey::new(subject, number),
            title: format!("{subject} {number}"),
            description: String::new(),
            prerequisites: vec![],
            corequisites: vec![],
            sections: vec![],
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut encoder = Encoder::new();
        let records = vec![
            encoder.encode(&record("CSCI", "1100")),
            encoder.encode(&record("CSCI", "1200")),
        ];

        save_shard(dir.path(), "CSCI", &records, encoder.tables()).unwrap();
        let shard = load_shard(dir.path(), "CSCI").unwrap().unwrap();
        assert_eq!(shard.subject, "CSCI");
        assert_eq!(shard.record_count, 2);
        assert_eq!(shard.records, records);
    }

    #[test]
    fn missing_shard_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_shard(dir.path(), "MATH").unwrap().is_none());
    }

    #[test]
    fn corrupt_shard_recovers_as_fresh_start() {
        let dir = TempDir::new().unwrap();
        fs_err::write(shard_path(dir.path(), "CSCI"), b"garbage bytes").unwrap();
        assert!(load_shard(dir.path(), "CSCI").unwrap().is_none());
    }

    #[test]
    fn v1_envelope_upgrades_on_load() {
        let dir = TempDir::new().unwrap();
        let config = bincode::config::standard();
        let v1 = ShardV1 {
            subject: "CSCI".into(),
            saved_at: Utc::now(),
            record_count: 1,
            records: vec![crate::types::EncodedCourseV1(
                "CSCI 1100".into(),
                "Computer Science I".into(),
                String::new(),
                vec![],
                vec![],
                vec![],
            )],
            tables: TableSet::default(),
        };
        let envelope = ShardEnvelope {
            version: 1,
            payload: bincode::serde::encode_to_vec(&v1, config).unwrap(),
        };
        let bytes = bincode::serde::encode_to_vec(&envelope, config).unwrap();
        fs_err::create_dir_all(dir.path()).unwrap();
        fs_err::write(shard_path(dir.path(), "CSCI"), bytes).unwrap();

        let shard = load_shard(dir.path(), "CSCI").unwrap().unwrap();
        assert_eq!(shard.records[0].0, "CSCI 1100");
    }

    #[test]
    fn load_all_shards_sorts_by_subject() {
        let dir = TempDir::new().unwrap();
        let encoder = Encoder::new();
        save_shard(dir.path(), "MATH", &[], encoder.tables()).unwrap();
        save_shard(dir.path(), "CSCI", &[], encoder.tables()).unwrap();
        let shards = load_all_shards(dir.path()).unwrap();
        let subjects: Vec<_> = shards.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, ["CSCI", "MATH"]);
    }
}
