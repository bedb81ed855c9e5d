//! Ranks candidate strings by fit with the document context.

use std::sync::Arc;

use crate::vectorizer::{SparseVector, TfIdfVectorizer};

/// Context vector of one document: every mention's normalised text, joined
/// with `" . "` and projected through the shared vectorizer.
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    vector: SparseVector,
}

impl DocumentContext {
    /// Separator between mentions in the context string.
    pub const SEPARATOR: &'static str = " . ";

    /// Builds the context from normalised mention texts.
    #[must_use]
    pub fn new<'a>(vectorizer: &TfIdfVectorizer, mentions: impl IntoIterator<Item = &'a str>) -> Self {
        let text = mentions.into_iter().collect::<Vec<_>>().join(Self::SEPARATOR);
        Self {
            vector: vectorizer.transform(&text),
        }
    }

    /// The projected vector.
    #[must_use]
    pub fn vector(&self) -> &SparseVector {
        &self.vector
    }
}

/// Scores a candidate corpus against a [`DocumentContext`].
#[derive(Debug, Clone)]
pub struct CorpusScorer {
    vectorizer: Arc<TfIdfVectorizer>,
}

impl CorpusScorer {
    /// Creates a scorer over the shared vectorizer.
    #[must_use]
    pub fn new(vectorizer: Arc<TfIdfVectorizer>) -> Self {
        Self { vectorizer }
    }

    /// One `(candidate, score)` pair per corpus entry, best first, where
    /// `score = 100 · (candidate · context)`. Ties keep corpus order. An empty
    /// corpus yields nothing.
    #[must_use]
    pub fn score<'a>(&self, corpus: &[&'a str], context: &DocumentContext) -> Vec<(&'a str, f64)> {
        let mut scored: Vec<(&'a str, f64)> = corpus
            .iter()
            .map(|candidate| {
                let sim = self.vectorizer.transform(candidate).dot(context.vector());
                (*candidate, 100.0 * sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> (CorpusScorer, Arc<TfIdfVectorizer>) {
        let v = Arc::new(TfIdfVectorizer::fit([
            "osimertinib",
            "aspirin",
            "non small cell lung cancer",
            "egfr",
        ]));
        (CorpusScorer::new(Arc::clone(&v)), v)
    }

    #[test]
    fn ranks_contextual_candidates_first() {
        let (scorer, v) = scorer();
        let ctx = DocumentContext::new(&v, ["osimertinib", "non small cell lung cancer"]);
        let ranked = scorer.score(&["aspirin", "osimertinib"], &ctx);
        assert_eq!(ranked[0].0, "osimertinib");
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        let (scorer, v) = scorer();
        let ctx = DocumentContext::new(&v, ["egfr"]);
        assert!(scorer.score(&[], &ctx).is_empty());
    }

    #[test]
    fn single_candidate_still_scored() {
        let (scorer, v) = scorer();
        let ctx = DocumentContext::new(&v, ["egfr"]);
        let ranked = scorer.score(&["egfr"], &ctx);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].1 - 100.0).abs() < 1e-9);
    }
}
