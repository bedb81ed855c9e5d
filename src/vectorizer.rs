//! TF-IDF document vectorizer.
//!
//! Terms are word unigrams, word bigrams, and character trigrams (see
//! [`crate::text::analyze`]). The vectorizer is fit once over every synonym of
//! every loaded knowledge base and persisted, so all documents are projected
//! through the same fixed vocabulary.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ExecutionError, IndexError, LinkResult};
use crate::registry::SynonymRegistry;
use crate::storage::codec::{self, ArtifactTag};
use crate::storage::BuildLock;
use crate::text::analyze;

/// L2-normalised sparse vector, entries sorted by term id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Dot product with `other`.
    #[must_use]
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        while i < self.entries.len() && j < other.entries.len() {
            let (ti, wi) = self.entries[i];
            let (tj, wj) = other.entries[j];
            match ti.cmp(&tj) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wi * wj;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Number of non-zero terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no known term occurred.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fitted vocabulary with smoothed inverse document frequencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Fits on `corpus`; one document per item.
    ///
    /// Vocabulary ids follow sorted term order. `idf = ln((1 + n) / (1 + df)) + 1`.
    #[must_use]
    pub fn fit<I, S>(corpus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        let mut n_docs = 0usize;
        for doc in corpus {
            n_docs += 1;
            let terms: BTreeSet<String> = analyze(doc.as_ref()).into_iter().collect();
            for term in terms {
                *df.entry(term).or_default() += 1;
            }
        }

        let n = n_docs as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(df.len());
        for (id, (term, count)) in df.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + count as f64)).ln() + 1.0);
            vocabulary.insert(term, id);
        }
        Self { vocabulary, idf }
    }

    /// Number of terms in the vocabulary.
    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Projects `text` onto the vocabulary. Unknown terms are dropped.
    #[must_use]
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut tf: HashMap<usize, f64> = HashMap::new();
        for term in analyze(text) {
            if let Some(&id) = self.vocabulary.get(&term) {
                *tf.entry(id).or_default() += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = tf
            .into_iter()
            .map(|(id, count)| (id, count * self.idf[id]))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut entries {
                *w /= norm;
            }
        }
        SparseVector { entries }
    }

    /// Writes the vectorizer to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        codec::write_file(path, ArtifactTag::Vectorizer, self)?;
        Ok(())
    }

    /// Reads a vectorizer written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let vectorizer: Self = codec::read_file(path, ArtifactTag::Vectorizer).map_err(|e| match e.kind() {
            ErrorKind::NotFound => IndexError::NotFound(path.to_path_buf()),
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                IndexError::Corrupted(format!("{}: {e}", path.display()))
            }
            _ => IndexError::Io(e),
        })?;
        let ids_in_range = vectorizer.vocabulary.values().all(|&id| id < vectorizer.idf.len());
        if vectorizer.vocabulary.len() != vectorizer.idf.len() || !ids_in_range {
            return Err(IndexError::Corrupted(format!(
                "{}: vocabulary of {} terms with {} idf weights",
                path.display(),
                vectorizer.vocabulary.len(),
                vectorizer.idf.len()
            )));
        }
        Ok(vectorizer)
    }

    /// Loads the vectorizer at `path`, or fits it over every synonym in
    /// `registry` and saves it there.
    ///
    /// A first-time build holds an exclusive lock file beside the artifact.
    ///
    /// # Errors
    /// `BuildInProgress` if another builder holds the lock.
    pub fn build_or_load(path: &Path, registry: &SynonymRegistry) -> LinkResult<Self> {
        if path.is_file() {
            let vectorizer = Self::load(path)?;
            info!(path = %path.display(), terms = vectorizer.vocabulary_len(), "vectorizer loaded");
            return Ok(vectorizer);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let Some(lock) = BuildLock::try_acquire(path)? else {
            return Err(ExecutionError::BuildInProgress {
                path: path.to_path_buf(),
            }
            .into());
        };
        debug!(lock = %lock.path().display(), "vectorizer build lock taken");

        // A previous lock holder may have written it already.
        if path.is_file() {
            return Ok(Self::load(path)?);
        }

        // Synonyms shared by several knowledge bases count once per base.
        let corpus: Vec<&str> = registry
            .get_loaded_kbs()
            .filter_map(|kb| registry.get_all(kb))
            .flat_map(|table| table.keys().map(String::as_str))
            .collect();
        let vectorizer = Self::fit(&corpus);
        vectorizer.save(path)?;
        info!(
            path = %path.display(),
            documents = corpus.len(),
            terms = vectorizer.vocabulary_len(),
            "vectorizer built"
        );
        Ok(vectorizer)
    }
}
