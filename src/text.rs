//! String normalisation and featurisation shared by indices and strategies.

/// Normalise a surface string for comparison.
///
/// Lower-cases, replaces every run of non-alphanumeric characters with a
/// single space, and trims.
#[must_use]
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Classifies mentions as symbol-like (acronyms, identifiers) or ordinary phrases.
pub trait SymbolClassifier: Send + Sync {
    /// Returns true if `text` looks like a symbol rather than a phrase.
    fn is_symbol_like(&self, text: &str) -> bool;
}

/// Default heuristic classifier.
///
/// A mention is symbol-like when it is a single token and either contains a
/// digit or has at least as many upper-case letters as lower-case ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSymbolClassifier;

impl SymbolClassifier for DefaultSymbolClassifier {
    fn is_symbol_like(&self, text: &str) -> bool {
        let mut tokens = text.split_whitespace();
        if tokens.next().is_none() || tokens.next().is_some() {
            return false;
        }

        let (mut upper, mut lower, mut digits) = (0usize, 0usize, 0usize);
        for c in text.chars() {
            if c.is_uppercase() {
                upper += 1;
            } else if c.is_lowercase() {
                lower += 1;
            } else if c.is_numeric() {
                digits += 1;
            }
        }
        digits > 0 || upper >= lower
    }
}

/// Length of the longest common (character) subsequence of `a` and `b`.
#[must_use]
pub fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // Two rolling rows over b.
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Word n-grams of a whitespace-tokenised string.
#[must_use]
pub fn word_ngrams(s: &str, n: usize) -> Vec<String> {
    let words: Vec<&str> = s.split_whitespace().collect();
    if n == 0 || words.len() < n {
        return Vec::new();
    }
    words.windows(n).map(|w| w.join(" ")).collect()
}

/// Character n-grams; strings shorter than `n` yield themselves.
#[must_use]
pub fn char_ngrams(s: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() || n == 0 {
        return Vec::new();
    }
    if chars.len() < n {
        return vec![s.to_string()];
    }
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

/// Term analyzer used by the document vectorizer: word unigrams, word bigrams,
/// and character trigrams.
#[must_use]
pub fn analyze(s: &str) -> Vec<String> {
    let mut terms = word_ngrams(s, 1);
    terms.extend(word_ngrams(s, 2));
    terms.extend(char_ngrams(s, 3));
    terms
}
