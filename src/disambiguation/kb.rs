//! Knowledge-base level strategies: pick identifiers for one
//! `(mention, entity class)` group.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::synonym::SynonymDataResolver;
use super::StrategyContext;
use crate::confidence::LinkRank;
use crate::document::{Entity, Hit, Mapping, SynonymData, DISAMBIGUATED_BY};

/// Knowledge-base strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KbStrategy {
    /// Reuse an identifier already mapped elsewhere in the document.
    RequireFullDefinition,
    /// Rank the candidates' synonyms against the document context and take
    /// the best one that resolves.
    TfIdf {
        /// Also require 70% ordered overlap between mention and synonym.
        #[serde(default)]
        check_substring: bool,
    },
}

/// One accepted candidate: the hit it came from, the winning identifier
/// group, and the confidence to map it at.
pub type Resolution = (Hit, SynonymData, LinkRank);

impl KbStrategy {
    /// Name recorded under [`DISAMBIGUATED_BY`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequireFullDefinition => "require_full_definition",
            Self::TfIdf { .. } => "tf_idf",
        }
    }

    /// Runs the strategy over the entities sharing `mention`.
    #[must_use]
    pub fn run(self, mention: &str, entities: &[&Entity], ctx: &StrategyContext<'_>) -> Vec<Resolution> {
        match self {
            Self::RequireFullDefinition => require_full_definition(entities, ctx),
            Self::TfIdf { check_substring } => tf_idf(mention, entities, check_substring, ctx),
        }
    }
}

fn distinct_hits<'e>(entities: &[&'e Entity]) -> BTreeSet<&'e Hit> {
    entities.iter().copied().flat_map(|e| e.hits.iter()).collect()
}

fn require_full_definition(entities: &[&Entity], ctx: &StrategyContext<'_>) -> Vec<Resolution> {
    let resolved = ctx.document.mapped_ids();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for hit in distinct_hits(entities) {
        for data in &hit.syn_data {
            let defined = data
                .ids
                .iter()
                .any(|idx| resolved.contains(&(hit.source.clone(), idx.clone())));
            if defined && seen.insert((hit, data)) {
                out.push((hit.clone(), data.clone(), LinkRank::High));
            }
        }
    }
    out
}

/// Emits at most one resolution per source: the best-scoring synonym that
/// resolves.
fn tf_idf(
    mention: &str,
    entities: &[&Entity],
    check_substring: bool,
    ctx: &StrategyContext<'_>,
) -> Vec<Resolution> {
    let resolver = SynonymDataResolver::new(mention, check_substring, ctx.synonyms, ctx.metadata);

    let mut out = Vec::new();
    let mut by_source: BTreeMap<&str, Vec<&Hit>> = BTreeMap::new();
    for hit in distinct_hits(entities) {
        by_source.entry(hit.source.as_str()).or_default().push(hit);
    }

    for (source, hits) in by_source {
        let mut hit_lookup: BTreeMap<&str, BTreeSet<&Hit>> = BTreeMap::new();
        for &hit in &hits {
            for data in &hit.syn_data {
                for idx in &data.ids {
                    for synonym in ctx.synonyms.get_syns_for_id(source, idx) {
                        hit_lookup.entry(synonym).or_default().insert(hit);
                    }
                }
            }
        }

        let corpus: Vec<&str> = hit_lookup.keys().copied().collect();
        for (synonym, score) in ctx.scorer.score(&corpus, ctx.context) {
            let Some(data) = resolver.resolve(synonym, source) else {
                continue;
            };
            let Some(found) = hit_lookup.get(synonym) else {
                continue;
            };
            if found.len() > 1 {
                warn!(
                    synonym,
                    source,
                    hits = found.len(),
                    "multiple hits for the same synonym, keeping the first"
                );
            }
            if let Some(&hit) = found.iter().next() {
                debug!(mention, synonym, source, score, "resolved on document context");
                out.push((hit.clone(), data, LinkRank::Medium));
                break;
            }
        }
    }
    out
}

/// Runs `chain` in order and returns the mappings of the first strategy that
/// produces any. One mapping is created per identifier of each winning
/// group.
#[must_use]
pub fn run_kb_chain(
    chain: &[KbStrategy],
    mention: &str,
    entities: &[&Entity],
    ctx: &StrategyContext<'_>,
) -> Vec<Mapping> {
    for &strategy in chain {
        let mut mappings = Vec::new();
        for (hit, data, confidence) in strategy.run(mention, entities, ctx) {
            for idx in &data.ids {
                let mut provenance = Map::new();
                provenance.insert(DISAMBIGUATED_BY.to_string(), Value::from(strategy.name()));
                mappings.push(ctx.metadata.create_mapping(
                    &hit.source,
                    data.source_of(idx).unwrap_or(&hit.source),
                    idx,
                    data.mapping_type.clone(),
                    confidence,
                    provenance,
                ));
            }
        }
        if !mappings.is_empty() {
            return mappings;
        }
    }
    Vec::new()
}
