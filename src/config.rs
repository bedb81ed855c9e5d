//! Typed configuration.
//!
//! Every struct has a `Default` reproducing the built-in behaviour and a
//! `validate` step that consumes and returns the value, so callers can write
//! `DisambiguatorConfig::default().validate()?`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::disambiguation::{GlobalStrategy, KbStrategy};
use crate::error::ValidationError;

/// Entity classes with dedicated knowledge-base chains by default.
pub const DEFAULT_CLASSES: [&str; 3] = ["gene", "disease", "drug"];

/// Retrieval options for [`crate::index::CandidateIndex::search`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub top_n: usize,
    /// Minimum fuzzy score on a 0–100 scale. Ignored for exact lookups and
    /// vector indices.
    pub score_cutoff: f64,
    /// Weighted-ratio fuzzy matching instead of exact equality.
    pub fuzzy: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_n: 20,
            score_cutoff: 99.0,
            fuzzy: true,
        }
    }
}

impl SearchOptions {
    /// Validates the options.
    ///
    /// # Errors
    /// `InvalidConfig` if `score_cutoff` is outside `[0, 100]`.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !(0.0..=100.0).contains(&self.score_cutoff) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("score_cutoff must be within [0, 100] (got {})", self.score_cutoff),
            });
        }
        Ok(self)
    }
}

/// Strategy chains and shared artifacts for the disambiguator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguatorConfig {
    /// Location of the document vectorizer artifact. Built on first use if
    /// absent.
    pub vectorizer_path: PathBuf,
    /// Knowledge-base groups treated as interchangeable by the global
    /// compatibility rule.
    pub allowed_overlaps: Vec<BTreeSet<String>>,
    /// Global chain for symbol-like mentions.
    pub symbolic_global: Vec<GlobalStrategy>,
    /// Global chain for ordinary phrases.
    pub non_symbolic_global: Vec<GlobalStrategy>,
    /// Knowledge-base chains per entity class, symbol-like mentions.
    pub symbolic_kb: BTreeMap<String, Vec<KbStrategy>>,
    /// Knowledge-base chains per entity class, ordinary phrases.
    pub non_symbolic_kb: BTreeMap<String, Vec<KbStrategy>>,
    /// Chain for symbol-like mentions of any other class.
    pub symbolic_default: Vec<KbStrategy>,
    /// Chain for ordinary phrases of any other class.
    pub non_symbolic_default: Vec<KbStrategy>,
}

impl Default for DisambiguatorConfig {
    fn default() -> Self {
        let global = vec![
            GlobalStrategy::KeepHighConfidenceHits {
                min_string_length: 3,
            },
            GlobalStrategy::TfIdf { threshold: 7.0 },
        ];
        let per_class = |chain: Vec<KbStrategy>| -> BTreeMap<String, Vec<KbStrategy>> {
            DEFAULT_CLASSES
                .iter()
                .map(|class| ((*class).to_string(), chain.clone()))
                .collect()
        };
        let overlap = |kbs: &[&str]| kbs.iter().map(|kb| (*kb).to_string()).collect();

        Self {
            vectorizer_path: PathBuf::from("tfidf_vectorizer.ontl"),
            allowed_overlaps: vec![
                overlap(&["MONDO", "MEDDRA", "OPENTARGETS_DISEASE"]),
                overlap(&["CHEMBL", "OPENTARGETS_MOLECULE", "OPENTARGETS_TARGET"]),
            ],
            symbolic_global: global.clone(),
            non_symbolic_global: global,
            symbolic_kb: per_class(vec![KbStrategy::RequireFullDefinition]),
            non_symbolic_kb: per_class(vec![KbStrategy::TfIdf {
                check_substring: false,
            }]),
            symbolic_default: vec![KbStrategy::RequireFullDefinition],
            non_symbolic_default: vec![
                KbStrategy::RequireFullDefinition,
                KbStrategy::TfIdf {
                    check_substring: true,
                },
            ],
        }
    }
}

impl DisambiguatorConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// `InvalidConfig` for an empty vectorizer path, an overlap group with
    /// fewer than two knowledge bases, or a global threshold that is negative
    /// or not finite.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.vectorizer_path.as_os_str().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "vectorizer_path must not be empty".to_string(),
            });
        }

        if let Some(group) = self.allowed_overlaps.iter().find(|g| g.len() < 2) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("allowed overlap group {group:?} must name at least two knowledge bases"),
            });
        }

        for strategy in self.symbolic_global.iter().chain(&self.non_symbolic_global) {
            if let GlobalStrategy::TfIdf { threshold } = strategy {
                if !threshold.is_finite() || *threshold < 0.0 {
                    return Err(ValidationError::InvalidConfig {
                        reason: format!("tf_idf threshold must be finite and non-negative (got {threshold})"),
                    });
                }
            }
        }

        Ok(self)
    }
}

/// Worker pool sizing for [`crate::runtime::DisambiguationRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued documents.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// `InvalidConfig` if either value is zero.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "workers must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "queue_capacity must be at least 1".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SearchOptions::default().validate().unwrap();
        RuntimeConfig::default().validate().unwrap();
        let config = DisambiguatorConfig::default().validate().unwrap();
        assert_eq!(config.symbolic_kb.len(), 3);
        assert_ne!(config.symbolic_default, config.non_symbolic_default);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let opts = SearchOptions {
            score_cutoff: 101.0,
            ..SearchOptions::default()
        };
        assert!(opts.validate().is_err());

        let runtime = RuntimeConfig {
            workers: 0,
            ..RuntimeConfig::default()
        };
        assert!(runtime.validate().is_err());

        let mut config = DisambiguatorConfig::default();
        config.non_symbolic_global = vec![GlobalStrategy::TfIdf { threshold: f64::NAN }];
        assert!(config.validate().is_err());

        let mut config = DisambiguatorConfig::default();
        config.allowed_overlaps.push(BTreeSet::from(["MONDO".to_string()]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DisambiguatorConfig = serde_json::from_str(
            r#"{"symbolic_default": [{"type": "tf_idf", "check_substring": true}]}"#,
        )
        .unwrap();
        assert_eq!(
            config.symbolic_default,
            vec![KbStrategy::TfIdf {
                check_substring: true
            }]
        );
        assert_eq!(config.non_symbolic_global.len(), 2);
    }
}
