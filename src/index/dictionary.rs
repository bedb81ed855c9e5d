//! Exact and fuzzy synonym-string index.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::artifact::{read_error, ArtifactDir, IndexKind};
use super::fuzz::wratio;
use super::metadata::MetadataTable;
use super::{CandidateIndex, SearchHit};
use crate::config::SearchOptions;
use crate::error::{IndexError, ValidationError};
use crate::registry::{MetadataRegistry, SynonymRegistry};
use crate::storage::codec::{self, ArtifactTag};

/// One synonym table row. `idx` is a foreign key into the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymRow {
    /// Synonym string, case-folded when added to an index.
    pub synonym: String,
    /// Identifier the synonym names.
    pub idx: String,
    /// Mapping-type tags.
    pub mapping_type: BTreeSet<String>,
}

impl SynonymRow {
    /// Creates a row.
    #[must_use]
    pub fn new(
        synonym: impl Into<String>,
        idx: impl Into<String>,
        mapping_type: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            synonym: synonym.into(),
            idx: idx.into(),
            mapping_type: mapping_type.into_iter().map(Into::into).collect(),
        }
    }
}

/// A batch of synonyms plus the metadata rows they reference.
#[derive(Debug, Clone, Default)]
pub struct DictionaryEntries {
    /// Synonym table rows.
    pub synonyms: Vec<SynonymRow>,
    /// Metadata for identifiers introduced by this batch.
    pub metadata: MetadataTable,
}

/// Synonym-string index with exact and weighted-ratio fuzzy lookup.
#[derive(Debug, Clone)]
pub struct DictionaryIndex {
    name: String,
    synonyms: Vec<SynonymRow>,
    metadata: MetadataTable,
    exact: HashMap<String, Vec<usize>>,
}

impl DictionaryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            synonyms: Vec::new(),
            metadata: MetadataTable::default(),
            exact: HashMap::new(),
        }
    }

    /// Builds an index over every synonym of knowledge base `kb`.
    ///
    /// # Errors
    /// `UnknownIdentifier` if a synonym names an identifier with no metadata
    /// row in `kb`.
    pub fn from_registries(
        name: impl Into<String>,
        kb: &str,
        synonyms: &SynonymRegistry,
        metadata: &MetadataRegistry,
    ) -> Result<Self, IndexError> {
        let rows = synonyms
            .get_all(kb)
            .into_iter()
            .flatten()
            .flat_map(|(synonym, groups)| {
                groups.iter().flat_map(move |data| {
                    data.ids.iter().map(move |idx| SynonymRow {
                        synonym: synonym.clone(),
                        idx: idx.clone(),
                        mapping_type: data.mapping_type.clone(),
                    })
                })
            })
            .collect();
        let table = MetadataTable::from_records(
            metadata
                .iter_kb(kb)
                .map(|(idx, attrs)| (idx.to_string(), attrs.clone())),
        )?;

        let mut index = Self::new(name);
        index.add(DictionaryEntries {
            synonyms: rows,
            metadata: table,
        })?;
        Ok(index)
    }

    /// The metadata table.
    #[must_use]
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// Number of synonym rows.
    #[must_use]
    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }

    fn rebuild_exact(&mut self) {
        self.exact.clear();
        for (pos, row) in self.synonyms.iter().enumerate() {
            self.exact.entry(row.synonym.clone()).or_default().push(pos);
        }
    }

    fn hit(&self, row: &SynonymRow, score: f64) -> SearchHit {
        let attributes = self
            .metadata
            .position(&row.idx)
            .map_or_else(Map::<String, Value>::new, |pos| self.metadata.attributes_at(pos));
        SearchHit {
            idx: row.idx.clone(),
            synonym: Some(row.synonym.clone()),
            mapping_type: row.mapping_type.clone(),
            attributes,
            score,
        }
    }
}

impl CandidateIndex for DictionaryIndex {
    type Query = str;
    type Entries = DictionaryEntries;

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Dictionary
    }

    /// Number of distinct identifiers.
    fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Exact mode returns every row whose synonym equals the lower-cased
    /// query, at score 100. Fuzzy mode returns up to `top_n` rows scoring at
    /// least `score_cutoff`, best first.
    fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>, IndexError> {
        let query = query.to_lowercase();

        if !options.fuzzy {
            let hits = self
                .exact
                .get(&query)
                .into_iter()
                .flatten()
                .map(|&pos| self.hit(&self.synonyms[pos], 100.0))
                .collect();
            return Ok(hits);
        }

        let mut scored: Vec<(usize, f64)> = self
            .synonyms
            .iter()
            .enumerate()
            .map(|(pos, row)| (pos, wratio(&query, &row.synonym)))
            .filter(|(_, score)| *score >= options.score_cutoff)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(options.top_n);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| self.hit(&self.synonyms[pos], score))
            .collect())
    }

    fn add(&mut self, entries: DictionaryEntries) -> Result<(), IndexError> {
        let mut merged = self.metadata.clone();
        merged.concat(entries.metadata)?;

        let mut rows = entries.synonyms;
        for row in &mut rows {
            if !merged.contains(&row.idx) {
                return Err(ValidationError::UnknownIdentifier {
                    synonym: row.synonym.clone(),
                    idx: row.idx.clone(),
                }
                .into());
            }
            row.synonym = row.synonym.to_lowercase();
        }

        self.metadata = merged;
        self.synonyms.extend(rows);
        self.rebuild_exact();
        Ok(())
    }

    fn save(&self, parent: &Path) -> Result<PathBuf, IndexError> {
        let artifact = ArtifactDir::create(parent, &self.name)?;
        artifact.write_metadata(&self.metadata)?;
        codec::write_file(&artifact.data_path(), ArtifactTag::Synonyms, &self.synonyms)?;
        artifact.seal(self.kind(), self.synonyms.len())?;
        Ok(artifact.path().to_path_buf())
    }

    fn load(parent: &Path, name: &str) -> Result<Self, IndexError> {
        let artifact = ArtifactDir::open(parent, name)?;
        let manifest = artifact.read_manifest(|kind| kind == IndexKind::Dictionary, "dictionary")?;

        let data_path = artifact.data_path();
        let synonyms: Vec<SynonymRow> =
            codec::read_file(&data_path, ArtifactTag::Synonyms).map_err(|e| read_error(&data_path, e))?;
        manifest.check_rows(synonyms.len())?;
        let metadata = artifact.read_metadata()?;
        if let Some(row) = synonyms.iter().find(|row| !metadata.contains(&row.idx)) {
            return Err(ValidationError::UnknownIdentifier {
                synonym: row.synonym.clone(),
                idx: row.idx.clone(),
            }
            .into());
        }

        let mut index = Self {
            name: name.to_string(),
            synonyms,
            metadata,
            exact: HashMap::new(),
        };
        index.rebuild_exact();
        Ok(index)
    }
}
