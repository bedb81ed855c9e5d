//! On-disk layout of a named index.
//!
//! ```text
//! <parent>/<name>/
//!     index.manifest           control object: name, kind, row count, payload checksum
//!     ontology_metadata.table  columnar metadata keyed by identifier
//!     index.data               backend-specific payload
//! ```
//!
//! Saving replaces any existing directory. The manifest is written last and
//! carries a blake3 checksum of the payload, so a half-written artifact fails
//! to load instead of yielding partial results.

use std::fmt;
use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::embedding::EmbeddingBackend;
use super::metadata::MetadataTable;
use crate::error::{IndexError, ValidationError};
use crate::storage::codec::{self, ArtifactTag};

const MANIFEST_FILE: &str = "index.manifest";
const METADATA_FILE: &str = "ontology_metadata.table";
const DATA_FILE: &str = "index.data";

/// Which index family wrote an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact/fuzzy synonym index.
    Dictionary,
    /// Vector index with the given scoring backend.
    Embedding {
        /// Scoring backend.
        backend: EmbeddingBackend,
    },
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dictionary => write!(f, "dictionary"),
            Self::Embedding { backend } => write!(f, "embedding/{}", backend.name()),
        }
    }
}

/// Serialized control object of an index artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Index name; must match the directory it was loaded from.
    pub name: String,
    /// Index family.
    pub kind: IndexKind,
    /// Number of payload rows (synonym rows or embeddings).
    pub rows: usize,
    /// blake3 hex digest of `index.data`.
    pub payload_checksum: String,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    /// Fails with `Corrupted` unless the payload holds the recorded row count.
    pub(crate) fn check_rows(&self, found: usize) -> Result<(), IndexError> {
        if found == self.rows {
            return Ok(());
        }
        Err(IndexError::Corrupted(format!(
            "index '{}' manifest records {} rows, payload holds {found}",
            self.name, self.rows
        )))
    }
}

/// Handle on one `<parent>/<name>` artifact directory.
#[derive(Debug)]
pub(crate) struct ArtifactDir {
    name: String,
    path: PathBuf,
}

impl ArtifactDir {
    /// Creates (or empties) the directory for `name` under `parent`.
    pub(crate) fn create(parent: &Path, name: &str) -> Result<Self, IndexError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyIndexName.into());
        }
        let path = parent.join(name);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Opens an existing directory for `name` under `parent`.
    pub(crate) fn open(parent: &Path, name: &str) -> Result<Self, IndexError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyIndexName.into());
        }
        let path = parent.join(name);
        if !path.is_dir() {
            return Err(IndexError::NotFound(path));
        }
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    pub(crate) fn write_metadata(&self, table: &MetadataTable) -> Result<(), IndexError> {
        codec::write_file(&self.path.join(METADATA_FILE), ArtifactTag::MetadataTable, table)?;
        Ok(())
    }

    pub(crate) fn read_metadata(&self) -> Result<MetadataTable, IndexError> {
        let path = self.path.join(METADATA_FILE);
        codec::read_file(&path, ArtifactTag::MetadataTable).map_err(|e| read_error(&path, e))
    }

    /// Checksums the payload and writes the manifest. Call after the
    /// metadata and payload are on disk.
    pub(crate) fn seal(&self, kind: IndexKind, rows: usize) -> Result<IndexManifest, IndexError> {
        let manifest = IndexManifest {
            name: self.name.clone(),
            kind,
            rows,
            payload_checksum: payload_checksum(&self.data_path())?,
            created_at: Utc::now(),
        };
        codec::write_file(&self.path.join(MANIFEST_FILE), ArtifactTag::Manifest, &manifest)?;
        info!(index = %self.name, %kind, rows, path = %self.path.display(), "index saved");
        Ok(manifest)
    }

    /// Reads the manifest, checking the name, the kind family, and the
    /// payload checksum.
    pub(crate) fn read_manifest(
        &self,
        accepts: impl Fn(IndexKind) -> bool,
        expected: &str,
    ) -> Result<IndexManifest, IndexError> {
        let path = self.path.join(MANIFEST_FILE);
        let manifest: IndexManifest =
            codec::read_file(&path, ArtifactTag::Manifest).map_err(|e| read_error(&path, e))?;

        if manifest.name != self.name {
            return Err(IndexError::NotFound(self.path.clone()));
        }
        if !accepts(manifest.kind) {
            return Err(IndexError::KindMismatch {
                expected: expected.to_string(),
                found: manifest.kind.to_string(),
            });
        }

        let data_path = self.data_path();
        if !data_path.is_file() {
            return Err(IndexError::NotFound(data_path));
        }
        let actual = payload_checksum(&data_path)?;
        if actual != manifest.payload_checksum {
            return Err(IndexError::Corrupted(format!(
                "payload checksum mismatch for index '{}': manifest={}, file={actual}",
                self.name, manifest.payload_checksum
            )));
        }

        info!(index = %self.name, kind = %manifest.kind, rows = manifest.rows, "index loaded");
        Ok(manifest)
    }
}

fn payload_checksum(path: &Path) -> Result<String, IndexError> {
    let bytes = fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Maps artifact read failures: missing files are `NotFound`, framing and
/// checksum failures are `Corrupted`.
pub(crate) fn read_error(path: &Path, err: IoError) -> IndexError {
    match err.kind() {
        ErrorKind::NotFound => IndexError::NotFound(path.to_path_buf()),
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
            IndexError::Corrupted(format!("{}: {err}", path.display()))
        }
        _ => IndexError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let err = ArtifactDir::open(dir.path(), "absent").unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[test]
    fn empty_name_is_rejected() {
        let dir = tempdir().unwrap();
        let err = ArtifactDir::create(dir.path(), " ").unwrap_err();
        assert!(matches!(err, IndexError::Validation(ValidationError::EmptyIndexName)));
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let dir = tempdir().unwrap();
        let artifact = ArtifactDir::create(dir.path(), "genes").unwrap();
        fs::write(artifact.data_path(), b"payload").unwrap();
        artifact.seal(IndexKind::Dictionary, 1).unwrap();

        fs::write(artifact.data_path(), b"tampered").unwrap();
        let reopened = ArtifactDir::open(dir.path(), "genes").unwrap();
        let err = reopened
            .read_manifest(|k| k == IndexKind::Dictionary, "dictionary")
            .unwrap_err();
        assert!(matches!(err, IndexError::Corrupted(_)));
    }

    #[test]
    fn renamed_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let artifact = ArtifactDir::create(dir.path(), "genes").unwrap();
        fs::write(artifact.data_path(), b"payload").unwrap();
        artifact.seal(IndexKind::Dictionary, 1).unwrap();
        fs::rename(dir.path().join("genes"), dir.path().join("drugs")).unwrap();

        let reopened = ArtifactDir::open(dir.path(), "drugs").unwrap();
        let err = reopened
            .read_manifest(|k| k == IndexKind::Dictionary, "dictionary")
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }
}
