//! Confidence ranks for candidates and accepted mappings.
//!
//! Ranks are a small ordered enumeration rather than a calibrated number:
//! retrieval only knows whether a candidate was exact, approximate, or
//! inferred, and disambiguation only knows which strategy accepted it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered trust level attached to a [`Hit`](crate::document::Hit) or
/// [`Mapping`](crate::document::Mapping).
///
/// # Examples
///
/// ```
/// use ontolink::LinkRank;
///
/// assert!(LinkRank::High > LinkRank::Medium);
/// assert!(LinkRank::Medium > LinkRank::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRank {
    /// Inferred or weak candidate.
    Low,
    /// Approximate candidate, or accepted on document context.
    Medium,
    /// Exact candidate, or corroborated elsewhere in the document.
    High,
}

impl LinkRank {
    /// Returns a short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Default for LinkRank {
    fn default() -> Self {
        Self::Low
    }
}

impl fmt::Display for LinkRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_totally_ordered() {
        let mut ranks = vec![LinkRank::High, LinkRank::Low, LinkRank::Medium];
        ranks.sort();
        assert_eq!(ranks, vec![LinkRank::Low, LinkRank::Medium, LinkRank::High]);
    }

    #[test]
    fn rank_serializes_as_snake_case() {
        let json = serde_json::to_string(&LinkRank::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let back: LinkRank = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(back, LinkRank::High);
    }
}
