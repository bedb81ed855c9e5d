//! Candidate retrieval indices.
//!
//! Two families implement [`CandidateIndex`]:
//! - [`DictionaryIndex`]: exact or weighted-ratio fuzzy lookup over a
//!   synonym table
//! - [`EmbeddingIndex`]: nearest-neighbour lookup over identifier embeddings,
//!   with the scoring [`EmbeddingBackend`] chosen at construction
//!
//! Results are metadata rows with a score. [`expand_hits`] turns them into
//! [`Hit`]s through the synonym registry, ready to attach to an entity.

mod artifact;
mod dictionary;
mod embedding;
pub mod fuzz;
mod metadata;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::confidence::LinkRank;
use crate::config::SearchOptions;
use crate::document::{Hit, SynonymData, INFERRED};
use crate::error::IndexError;
use crate::registry::{SynonymRegistry, DEFAULT_LABEL};
use crate::text::normalize;

pub use artifact::{IndexKind, IndexManifest};
pub use dictionary::{DictionaryEntries, DictionaryIndex, SynonymRow};
pub use embedding::{EmbeddingBackend, EmbeddingEntries, EmbeddingIndex, Embeddings};
pub use metadata::MetadataTable;

/// One retrieval result: a metadata row joined with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the row.
    pub idx: String,
    /// Matched synonym, for string indices.
    pub synonym: Option<String>,
    /// Mapping-type tags.
    pub mapping_type: BTreeSet<String>,
    /// Non-null metadata attributes of the identifier.
    pub attributes: Map<String, Value>,
    /// Backend score. Its scale and direction depend on the index.
    pub score: f64,
}

/// Retrieval contract shared by all index families.
///
/// Indices are immutable after [`save`](Self::save); `add` needs exclusive
/// access, while `search` may run concurrently on a shared reference.
pub trait CandidateIndex: Send + Sync {
    /// Query type: a string or an embedding.
    type Query: ?Sized;
    /// Batch accepted by [`add`](Self::add).
    type Entries;

    /// Index name; also the artifact directory name.
    fn name(&self) -> &str;

    /// Index family, recorded in the artifact manifest.
    fn kind(&self) -> IndexKind;

    /// Number of indexed identifiers.
    fn len(&self) -> usize;

    /// Returns true if nothing has been added.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ranked results for `query`.
    fn search(&self, query: &Self::Query, options: &SearchOptions) -> Result<Vec<SearchHit>, IndexError>;

    /// Adds a batch, building the index on first call and appending after.
    /// Nothing is added if the batch fails validation.
    fn add(&mut self, entries: Self::Entries) -> Result<(), IndexError>;

    /// Writes the artifact to `<parent>/<name>`, replacing any existing one.
    fn save(&self, parent: &Path) -> Result<PathBuf, IndexError>;

    /// Reads the artifact at `<parent>/<name>`.
    ///
    /// # Errors
    /// `NotFound` if the directory is missing or holds a differently named
    /// index.
    fn load(parent: &Path, name: &str) -> Result<Self, IndexError>
    where
        Self: Sized;
}

/// Converts retrieval results from knowledge base `source` into hits.
///
/// String results expand through the registry to every identifier group of
/// the matched synonym: exact non-inferred rows scoring 100 are HIGH, other
/// string rows MEDIUM. Vector results (no synonym) become single-identifier
/// inferred hits at LOW, keyed by the identifier's normalised label. Results
/// sharing a synonym collapse into one hit at the best confidence.
#[must_use]
pub fn expand_hits(source: &str, results: &[SearchHit], registry: &SynonymRegistry) -> Vec<Hit> {
    let mut merged: BTreeMap<String, (LinkRank, BTreeSet<SynonymData>)> = BTreeMap::new();

    for result in results {
        let (string_norm, confidence, groups) = match &result.synonym {
            Some(synonym) => {
                let confidence = if result.score >= 100.0 && !result.mapping_type.contains(INFERRED) {
                    LinkRank::High
                } else {
                    LinkRank::Medium
                };
                let mut groups = registry.get(source, synonym);
                if groups.is_empty() {
                    groups.insert(row_data(result, source, result.mapping_type.clone()));
                }
                (synonym.clone(), confidence, groups)
            }
            None => {
                let label = result
                    .attributes
                    .get(DEFAULT_LABEL)
                    .and_then(Value::as_str)
                    .map_or_else(|| normalize(&result.idx), normalize);
                let data = row_data(result, source, BTreeSet::from([INFERRED.to_string()]));
                (label, LinkRank::Low, BTreeSet::from([data]))
            }
        };

        let entry = merged
            .entry(string_norm)
            .or_insert_with(|| (confidence, BTreeSet::new()));
        entry.0 = entry.0.max(confidence);
        entry.1.extend(groups);
    }

    merged
        .into_iter()
        .map(|(string_norm, (confidence, groups))| Hit::new(source, string_norm, confidence, groups))
        .collect()
}

fn row_data(result: &SearchHit, source: &str, mapping_type: BTreeSet<String>) -> SynonymData {
    SynonymData {
        ids: BTreeSet::from([result.idx.clone()]),
        ids_to_source: BTreeMap::from([(result.idx.clone(), source.to_string())]),
        mapping_type,
    }
}
