//! Manifest staging and atomic promotion.
//!
//! A run stages a provisional manifest listing every term it intends to
//! complete, then promotes it to the canonical path by a single atomic
//! rename only when the whole run succeeded. Readers of the canonical
//! manifest therefore never observe a half-written or partially-updated
//! file; on failure the previous canonical manifest, if any, stays valid
//! and untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{MANIFEST_FILE, MANIFEST_STAGING_FILE};
use crate::error::Result;
use crate::persist::{read_json, write_json_atomic};
use crate::types::TermCode;

/// One completed term in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub code: String,
    pub name: String,
}

/// Ordered list of completed terms with human-readable names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub terms: Vec<ManifestEntry>,
}

/// Publisher over the provisional/canonical manifest pair of one data dir.
#[derive(Debug)]
pub struct ManifestPublisher {
    staging_path: PathBuf,
    canonical_path: PathBuf,
}

impl ManifestPublisher {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            staging_path: data_dir.join(MANIFEST_STAGING_FILE),
            canonical_path: data_dir.join(MANIFEST_FILE),
        }
    }

    #[must_use]
    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }

    /// Writes the provisional manifest unconditionally at run start,
    /// listing every term the run intends to complete.
    pub fn stage(&self, terms: &[TermCode]) -> Result<()> {
        let manifest = Manifest {
            terms: terms
                .iter()
                .map(|term| ManifestEntry {
                    code: term.to_string(),
                    name: term.name(),
                })
                .collect(),
        };
        write_json_atomic(&self.staging_path, &manifest)?;
        tracing::debug!(terms = terms.len(), "provisional manifest staged");
        Ok(())
    }

    /// Promotes the provisional manifest to canonical by atomic rename.
    /// Callers gate this on every intended term having completed.
    pub fn promote(&self) -> Result<()> {
        fs_err::rename(&self.staging_path, &self.canonical_path)?;
        tracing::info!(
            manifest = %self.canonical_path.display(),
            "canonical manifest promoted"
        );
        Ok(())
    }

    /// Deletes the provisional manifest after a total failure. The previous
    /// canonical manifest, if any, stays untouched.
    pub fn discard(&self) -> Result<()> {
        match fs_err::remove_file(&self.staging_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the canonical manifest, the only file external consumers
    /// should read.
    pub fn load_canonical(&self) -> Result<Option<Manifest>> {
        read_json(&self.canonical_path)
    }
}
