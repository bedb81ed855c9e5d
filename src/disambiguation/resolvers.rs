//! Per-mention candidate filters.
//!
//! Both resolvers are built once from the normalised mention text and then
//! called on normalised candidate synonyms.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::text::lcs_len;

/// Minimum share of the mention that must appear, in order, in a candidate.
const MIN_SUBSEQUENCE_OVERLAP: f64 = 0.7;

fn number_tokens(s: &str) -> BTreeMap<&str, usize> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new("[0-9]+").expect("number pattern is a valid regex"));

    let mut counts = BTreeMap::new();
    for m in re.find_iter(s) {
        *counts.entry(m.as_str()).or_default() += 1;
    }
    counts
}

/// Rejects candidates whose numbers differ from the mention's.
///
/// Compares the multiset of digit runs, so "type 2 diabetes" never resolves
/// to "type 1 diabetes" but does resolve to "type 2 diabetes mellitus".
#[derive(Debug, Clone)]
pub struct NumberResolver {
    numbers: BTreeMap<String, usize>,
}

impl NumberResolver {
    /// Extracts the numbers of `query`.
    #[must_use]
    pub fn new(query: &str) -> Self {
        let numbers = number_tokens(query)
            .into_iter()
            .map(|(n, c)| (n.to_string(), c))
            .collect();
        Self { numbers }
    }

    /// Returns true if `candidate` carries exactly the same numbers.
    #[must_use]
    pub fn accepts(&self, candidate: &str) -> bool {
        let other = number_tokens(candidate);
        other.len() == self.numbers.len()
            && other
                .iter()
                .all(|(n, c)| self.numbers.get(*n) == Some(c))
    }
}

/// Rejects candidates sharing too little ordered text with the mention.
#[derive(Debug, Clone)]
pub struct SubstringResolver {
    query: String,
    min_overlap: f64,
}

impl SubstringResolver {
    /// Threshold is 70% of the mention length in characters.
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            min_overlap: query.chars().count() as f64 * MIN_SUBSEQUENCE_OVERLAP,
        }
    }

    /// Returns true if the longest common subsequence reaches the threshold.
    #[must_use]
    pub fn accepts(&self, candidate: &str) -> bool {
        lcs_len(&self.query, candidate) as f64 >= self.min_overlap
    }
}
