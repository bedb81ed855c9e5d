//! Weighted-ratio string similarity on a 0–100 scale.
//!
//! All ratios are indel-normalised: `100 · 2 · lcs / (|a| + |b|)`, counted in
//! characters.

use std::collections::BTreeSet;

use crate::text::lcs_len;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Plain indel similarity.
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    let total = char_len(a) + char_len(b);
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Best [`ratio`] of the shorter string against every equally long window
/// of the longer one.
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if char_len(a) <= char_len(b) { (a, b) } else { (b, a) };
    let short_len = char_len(short);
    if short_len == 0 {
        return 0.0;
    }

    let long_chars: Vec<char> = long.chars().collect();
    let mut best = 0.0f64;
    for window in long_chars.windows(short_len) {
        let window: String = window.iter().collect();
        best = best.max(ratio(short, &window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn tokens(s: &str) -> BTreeSet<&str> {
    s.split_whitespace().collect()
}

fn sorted_tokens(s: &str) -> String {
    let mut words: Vec<&str> = s.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

fn join_parts(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a} {b}"),
    }
}

/// [`ratio`] after sorting whitespace tokens.
#[must_use]
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Token-set similarity: compares the shared tokens against each side's
/// remainder, and is 100 when one token set contains the other.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let sect = ta.intersection(&tb).copied().collect::<Vec<_>>().join(" ");
    let diff_ab = ta.difference(&tb).copied().collect::<Vec<_>>().join(" ");
    let diff_ba = tb.difference(&ta).copied().collect::<Vec<_>>().join(" ");
    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let combined_ab = join_parts(&sect, &diff_ab);
    let combined_ba = join_parts(&sect, &diff_ba);
    let mut best = ratio(&combined_ab, &combined_ba);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_ab))
            .max(ratio(&sect, &combined_ba));
    }
    best
}

/// [`partial_ratio`] over sorted tokens; 100 if any token is shared.
#[must_use]
pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    if !ta.is_disjoint(&tb) {
        return 100.0;
    }
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Weighted ratio: picks the best of the plain, partial, and token-based
/// ratios, discounting the partial family by how different the lengths are.
/// Empty input on either side scores 0.
#[must_use]
pub fn wratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (char_len(a), char_len(b));
    if la == 0 || lb == 0 {
        return 0.0;
    }

    let len_ratio = la.max(lb) as f64 / la.min(lb) as f64;
    let plain = ratio(a, b);

    if len_ratio < 1.5 {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return plain.max(token * 0.95);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    plain
        .max(partial_ratio(a, b) * partial_scale)
        .max(partial_token_ratio(a, b) * 0.95 * partial_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_100() {
        assert_eq!(wratio("egfr", "egfr"), 100.0);
        assert_eq!(ratio("", ""), 100.0);
    }

    #[test]
    fn transposition_scores_below_exact() {
        let score = wratio("egrf", "egfr");
        assert!((score - 75.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(wratio("", "egfr"), 0.0);
        assert_eq!(wratio("egfr", ""), 0.0);
    }

    #[test]
    fn token_order_is_forgiven() {
        assert!(wratio("cancer breast", "breast cancer") >= 95.0);
        assert_eq!(token_sort_ratio("b a", "a b"), 100.0);
    }

    #[test]
    fn token_subset_is_full_set_match() {
        assert_eq!(token_set_ratio("breast cancer", "triple negative breast cancer"), 100.0);
    }

    #[test]
    fn partial_match_is_scaled_by_length_difference() {
        let score = wratio("egfr", "egfr receptor");
        // Exact window, scaled by 0.9 for a length ratio under 8.
        assert!((score - 90.0).abs() < 1e-9, "got {score}");
        let long = wratio("egfr", "epidermal growth factor receptor egfr");
        assert!((long - 60.0).abs() < 1e-9, "got {long}");
        assert_eq!(partial_ratio("egfr", "xx egfr xx"), 100.0);
    }
}
