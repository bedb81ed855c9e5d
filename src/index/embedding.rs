//! Vector index over identifier embeddings.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::artifact::{read_error, ArtifactDir, IndexKind};
use super::metadata::MetadataTable;
use super::{CandidateIndex, SearchHit};
use crate::config::SearchOptions;
use crate::document::INFERRED;
use crate::error::{IndexError, ValidationError};
use crate::storage::codec::{self, ArtifactTag};

/// Nearest-neighbour scoring backend, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Exhaustive squared Euclidean distance, ascending. Payload is a raw
    /// little-endian `f32` blob.
    FlatL2,
    /// Pairwise Euclidean distance, ascending.
    CDist,
    /// Dot-product similarity reported as `100 - 1/similarity`, descending.
    MatMul,
}

impl EmbeddingBackend {
    /// Returns the backend name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FlatL2 => "flat_l2",
            Self::CDist => "cdist",
            Self::MatMul => "matmul",
        }
    }

    /// Checks the backend is compiled in.
    ///
    /// # Errors
    /// `BackendUnavailable` when the backend's cargo feature is disabled.
    pub fn probe(self) -> Result<(), IndexError> {
        match self {
            #[cfg(not(feature = "flat-index"))]
            Self::FlatL2 => Err(IndexError::BackendUnavailable {
                backend: self.name(),
                reason: "built without the `flat-index` feature".to_string(),
            }),
            _ => Ok(()),
        }
    }

    const fn ascending(self) -> bool {
        !matches!(self, Self::MatMul)
    }

    fn raw_score(self, query: &[f32], row: &[f32]) -> f64 {
        match self {
            Self::FlatL2 => squared_l2(query, row),
            Self::CDist => squared_l2(query, row).sqrt(),
            Self::MatMul => query
                .iter()
                .zip(row)
                .map(|(a, b)| f64::from(*a) * f64::from(*b))
                .sum(),
        }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

/// Dense row-major embedding matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embeddings {
    dim: usize,
    data: Vec<f32>,
}

impl Embeddings {
    /// Builds a matrix from rows of equal length.
    ///
    /// # Errors
    /// `InvalidEmbeddingDimension` if a row's length differs from the first.
    pub fn from_rows<I>(rows: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        let mut dim = None;
        let mut data = Vec::new();
        for row in rows {
            let expected = *dim.get_or_insert(row.len());
            if row.len() != expected {
                return Err(ValidationError::InvalidEmbeddingDimension {
                    actual: row.len(),
                    expected,
                });
            }
            data.extend(row);
        }
        Ok(Self {
            dim: dim.unwrap_or(0),
            data,
        })
    }

    /// Row width.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    /// Returns true if the matrix has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim.max(1))
    }

    fn append(&mut self, other: Embeddings) -> Result<(), ValidationError> {
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.dim != self.dim {
            return Err(ValidationError::InvalidEmbeddingDimension {
                actual: other.dim,
                expected: self.dim,
            });
        }
        self.data.extend(other.data);
        Ok(())
    }
}

/// Embeddings plus one metadata row per embedding, in the same order.
#[derive(Debug, Clone)]
pub struct EmbeddingEntries {
    /// One row per identifier.
    pub embeddings: Embeddings,
    /// Metadata aligned with `embeddings`.
    pub metadata: MetadataTable,
}

/// Nearest-neighbour index over identifier embeddings.
///
/// Every result carries the [`INFERRED`] mapping type: similarity alone
/// cannot tell an exact synonym from a near one.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    name: String,
    backend: EmbeddingBackend,
    embeddings: Embeddings,
    metadata: MetadataTable,
}

impl EmbeddingIndex {
    /// Creates an empty index.
    ///
    /// # Errors
    /// `BackendUnavailable` if the backend fails its capability probe.
    pub fn new(name: impl Into<String>, backend: EmbeddingBackend) -> Result<Self, IndexError> {
        backend.probe()?;
        Ok(Self {
            name: name.into(),
            backend,
            embeddings: Embeddings::default(),
            metadata: MetadataTable::default(),
        })
    }

    /// The scoring backend.
    #[must_use]
    pub const fn backend(&self) -> EmbeddingBackend {
        self.backend
    }

    /// Embedding width, or 0 before the first `add`.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.embeddings.dim()
    }

    /// The metadata table.
    #[must_use]
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }
}

impl CandidateIndex for EmbeddingIndex {
    type Query = [f32];
    type Entries = EmbeddingEntries;

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Embedding {
            backend: self.backend,
        }
    }

    fn len(&self) -> usize {
        self.embeddings.len()
    }

    fn search(&self, query: &[f32], options: &SearchOptions) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() || options.top_n == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim() {
            return Err(ValidationError::InvalidEmbeddingDimension {
                actual: query.len(),
                expected: self.dim(),
            }
            .into());
        }

        let backend = self.backend;
        let mut scored: Vec<(usize, f64)> = self
            .embeddings
            .rows()
            .map(|row| backend.raw_score(query, row))
            .enumerate()
            .collect();
        // Stable sort keeps row order among ties.
        scored.sort_by(|a, b| {
            let ord = a.1.total_cmp(&b.1);
            if backend.ascending() {
                ord
            } else {
                ord.reverse()
            }
        });
        scored.truncate(options.top_n);

        let hits = scored
            .into_iter()
            .filter_map(|(pos, raw)| {
                let idx = self.metadata.idx_at(pos)?.to_string();
                let score = match backend {
                    EmbeddingBackend::MatMul => 100.0 - 1.0 / raw,
                    _ => raw,
                };
                Some(SearchHit {
                    idx,
                    synonym: None,
                    mapping_type: BTreeSet::from([INFERRED.to_string()]),
                    attributes: self.metadata.attributes_at(pos),
                    score,
                })
            })
            .collect();
        Ok(hits)
    }

    fn add(&mut self, entries: EmbeddingEntries) -> Result<(), IndexError> {
        let EmbeddingEntries {
            embeddings,
            metadata,
        } = entries;
        if embeddings.len() != metadata.len() {
            return Err(ValidationError::RowCountMismatch {
                embeddings: embeddings.len(),
                metadata: metadata.len(),
            }
            .into());
        }
        if !self.embeddings.is_empty() && embeddings.dim() != self.dim() {
            return Err(ValidationError::InvalidEmbeddingDimension {
                actual: embeddings.dim(),
                expected: self.dim(),
            }
            .into());
        }

        let mut merged = self.metadata.clone();
        merged.concat(metadata)?;
        self.embeddings.append(embeddings)?;
        self.metadata = merged;
        Ok(())
    }

    fn save(&self, parent: &Path) -> Result<PathBuf, IndexError> {
        let artifact = ArtifactDir::create(parent, &self.name)?;
        artifact.write_metadata(&self.metadata)?;
        match self.backend {
            EmbeddingBackend::FlatL2 => flat::write(&artifact.data_path(), &self.embeddings)?,
            EmbeddingBackend::CDist | EmbeddingBackend::MatMul => {
                codec::write_file(&artifact.data_path(), ArtifactTag::Embeddings, &self.embeddings)?;
            }
        }
        artifact.seal(self.kind(), self.len())?;
        Ok(artifact.path().to_path_buf())
    }

    fn load(parent: &Path, name: &str) -> Result<Self, IndexError> {
        let artifact = ArtifactDir::open(parent, name)?;
        let manifest = artifact.read_manifest(
            |kind| matches!(kind, IndexKind::Embedding { .. }),
            "embedding",
        )?;
        let IndexKind::Embedding { backend } = manifest.kind else {
            return Err(IndexError::KindMismatch {
                expected: "embedding".to_string(),
                found: manifest.kind.to_string(),
            });
        };
        backend.probe()?;

        let data_path = artifact.data_path();
        let embeddings = match backend {
            EmbeddingBackend::FlatL2 => flat::read(&data_path)?,
            EmbeddingBackend::CDist | EmbeddingBackend::MatMul => {
                codec::read_file(&data_path, ArtifactTag::Embeddings).map_err(|e| read_error(&data_path, e))?
            }
        };
        manifest.check_rows(embeddings.len())?;
        let metadata = artifact.read_metadata()?;
        if embeddings.len() != metadata.len() {
            return Err(ValidationError::RowCountMismatch {
                embeddings: embeddings.len(),
                metadata: metadata.len(),
            }
            .into());
        }

        Ok(Self {
            name: name.to_string(),
            backend,
            embeddings,
            metadata,
        })
    }
}

/// Raw blob for the flat backend:
/// `[header][dim: u32 LE][rows: u64 LE][rows·dim f32 LE]`.
mod flat {
    use std::fs::File;
    use std::io::{BufReader, Read, Write};
    use std::path::Path;

    use super::Embeddings;
    use crate::error::IndexError;
    use crate::index::artifact::read_error;
    use crate::storage::codec::{self, ArtifactTag};

    pub(super) fn write(path: &Path, matrix: &Embeddings) -> Result<(), IndexError> {
        let dim = u32::try_from(matrix.dim())
            .map_err(|_| IndexError::Corrupted(format!("embedding width {} too large", matrix.dim())))?;
        codec::write_atomic(path, |w| {
            codec::write_header(w, ArtifactTag::FlatVectors)?;
            w.write_all(&dim.to_le_bytes())?;
            w.write_all(&(matrix.len() as u64).to_le_bytes())?;
            matrix.data.iter().try_for_each(|v| w.write_all(&v.to_le_bytes()))
        })?;
        Ok(())
    }

    pub(super) fn read(path: &Path) -> Result<Embeddings, IndexError> {
        let file = File::open(path).map_err(|e| read_error(path, e))?;
        let mut r = BufReader::new(file);
        codec::read_header(&mut r, ArtifactTag::FlatVectors).map_err(|e| read_error(path, e))?;

        let mut dim = [0u8; 4];
        let mut rows = [0u8; 8];
        r.read_exact(&mut dim).map_err(|e| read_error(path, e))?;
        r.read_exact(&mut rows).map_err(|e| read_error(path, e))?;
        let dim = u32::from_le_bytes(dim) as usize;
        let rows = usize::try_from(u64::from_le_bytes(rows))
            .map_err(|_| IndexError::Corrupted(format!("{}: row count overflow", path.display())))?;

        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        if bytes.len() != rows.saturating_mul(dim).saturating_mul(4) {
            return Err(IndexError::Corrupted(format!(
                "{}: expected {rows}x{dim} floats, found {} bytes",
                path.display(),
                bytes.len()
            )));
        }
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Embeddings { dim, data })
    }
}
