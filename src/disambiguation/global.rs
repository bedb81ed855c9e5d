//! Document-global strategies: decide which entities sharing a mention are
//! worth knowledge-base level disambiguation at all.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::StrategyContext;
use crate::confidence::LinkRank;
use crate::document::EntityRef;

/// Label reported when no global strategy keeps anything.
pub const NO_SUCCESSFUL_STRATEGY: &str = "no_successful_strategy";

/// Global strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GlobalStrategy {
    /// Keep entities carrying a HIGH confidence hit, unless the mention is
    /// shorter than `min_string_length` characters.
    KeepHighConfidenceHits {
        /// Shortest mention trusted on confidence alone.
        min_string_length: usize,
    },
    /// Keep entities whose knowledge bases agree with the best-scoring
    /// synonym in the document context.
    TfIdf {
        /// Minimum context score (0–100) for the best synonym.
        threshold: f64,
    },
}

/// Result of a global chain for one mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalOutcome {
    /// Strategy that kept entities, or [`NO_SUCCESSFUL_STRATEGY`].
    pub strategy: &'static str,
    /// Entities cleared for knowledge-base disambiguation.
    pub kept: Vec<EntityRef>,
    /// Entities left ambiguous.
    pub ambiguous: Vec<EntityRef>,
}

/// True if a synonym's knowledge bases can be treated as one: a single
/// knowledge base, or a subset of one of the `allowed_overlaps` groups.
#[must_use]
pub fn kbs_are_compatible(kbs: &BTreeSet<String>, allowed_overlaps: &[BTreeSet<String>]) -> bool {
    kbs.len() == 1 || allowed_overlaps.iter().any(|group| kbs.is_subset(group))
}

impl GlobalStrategy {
    /// Name reported in [`GlobalOutcome::strategy`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::KeepHighConfidenceHits { .. } => "keep_high_confidence_hits",
            Self::TfIdf { .. } => "tf_idf",
        }
    }

    /// Splits `entities` (all sharing `mention`) into kept and still
    /// ambiguous.
    #[must_use]
    pub fn run(
        self,
        mention: &str,
        entities: &[EntityRef],
        ctx: &StrategyContext<'_>,
    ) -> (Vec<EntityRef>, Vec<EntityRef>) {
        match self {
            Self::KeepHighConfidenceHits { min_string_length } => {
                if mention.chars().count() < min_string_length {
                    return (Vec::new(), entities.to_vec());
                }
                entities
                    .iter()
                    .partition(|r| ctx.document.entity(**r).has_hit_with_rank(LinkRank::High))
            }
            Self::TfIdf { threshold } => tf_idf(entities, threshold, ctx),
        }
    }
}

fn tf_idf(
    entities: &[EntityRef],
    threshold: f64,
    ctx: &StrategyContext<'_>,
) -> (Vec<EntityRef>, Vec<EntityRef>) {
    let doc = ctx.document;
    let corpus: BTreeSet<&str> = entities
        .iter()
        .flat_map(|r| doc.entity(*r).hits.iter())
        .filter(|hit| hit.confidence != LinkRank::Low)
        .flat_map(|hit| {
            hit.syn_data
                .iter()
                .flat_map(|data| data.ids.iter())
                .flat_map(move |idx| ctx.synonyms.get_syns_for_id(&hit.source, idx))
        })
        .collect();
    let corpus: Vec<&str> = corpus.into_iter().collect();

    for (synonym, score) in ctx.scorer.score(&corpus, ctx.context) {
        if score < threshold {
            debug!(synonym, score, threshold, "document context too weak");
            break;
        }

        let kbs = ctx.synonyms.get_kbs_for_syn_global(synonym);
        if !kbs_are_compatible(&kbs, ctx.allowed_overlaps) {
            debug!(synonym, ?kbs, "still ambiguous: incompatible knowledge bases");
            continue;
        }

        let (kept, ambiguous): (Vec<EntityRef>, Vec<EntityRef>) = entities
            .iter()
            .partition(|r| doc.entity(**r).hits.iter().any(|h| kbs.contains(&h.source)));
        if !kept.is_empty() {
            return (kept, ambiguous);
        }
    }
    (Vec::new(), entities.to_vec())
}

/// Runs `chain` in order; the first strategy that keeps any entity wins.
#[must_use]
pub fn run_global_chain(
    chain: &[GlobalStrategy],
    mention: &str,
    entities: &[EntityRef],
    ctx: &StrategyContext<'_>,
) -> GlobalOutcome {
    for &strategy in chain {
        let (kept, ambiguous) = strategy.run(mention, entities, ctx);
        if !kept.is_empty() {
            return GlobalOutcome {
                strategy: strategy.name(),
                kept,
                ambiguous,
            };
        }
    }
    GlobalOutcome {
        strategy: NO_SUCCESSFUL_STRATEGY,
        kept: Vec::new(),
        ambiguous: entities.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disambiguation::test_support::Fixture;
    use crate::document::{CharSpan, Document, Entity, Hit, Section, SynonymData};

    fn set(kbs: &[&str]) -> BTreeSet<String> {
        kbs.iter().map(|s| (*s).to_string()).collect()
    }

    fn doc_with(entities: Vec<Entity>) -> Document {
        let mut section = Section::new("text", "");
        section.entities = entities;
        Document::new(vec![section])
    }

    fn entity(text: &str, hits: Vec<Hit>) -> Entity {
        Entity::new("ner", text, "drug", vec![CharSpan::new(0, text.len())]).with_hits(hits)
    }

    fn hit(source: &str, synonym: &str, idx: &str, confidence: LinkRank) -> Hit {
        Hit::new(source, synonym, confidence, [SynonymData::single(idx, source, "exact")])
    }

    #[test]
    fn compatibility_rule() {
        let fx = Fixture::new();
        assert!(kbs_are_compatible(&set(&["CHEMBL"]), &fx.overlaps));
        assert!(kbs_are_compatible(&set(&["CHEMBL", "OPENTARGETS_MOLECULE"]), &fx.overlaps));
        assert!(!kbs_are_compatible(&set(&["CHEMBL", "MONDO"]), &fx.overlaps));
    }

    #[test]
    fn keep_high_confidence_respects_min_length() {
        let fx = Fixture::new();
        let doc = doc_with(vec![
            entity("Osimertinib", vec![hit("CHEMBL", "osimertinib", "CHEMBL3353410", LinkRank::High)]),
            entity("Osimertinib", vec![hit("CHEMBL", "osimertinib", "CHEMBL3353410", LinkRank::Medium)]),
        ]);
        let refs = doc.entity_refs();
        let ctx = fx.context(&doc);
        let strategy = GlobalStrategy::KeepHighConfidenceHits {
            min_string_length: 3,
        };

        let (kept, ambiguous) = strategy.run("Osimertinib", &refs, &ctx.strategy());
        assert_eq!(kept, vec![refs[0]]);
        assert_eq!(ambiguous, vec![refs[1]]);

        let (kept, ambiguous) = strategy.run("Os", &refs, &ctx.strategy());
        assert!(kept.is_empty());
        assert_eq!(ambiguous.len(), 2);
    }

    #[test]
    fn tf_idf_keeps_entities_from_compatible_kbs() {
        let fx = Fixture::new();
        let doc = doc_with(vec![entity(
            "osimertinib",
            vec![
                hit("CHEMBL", "osimertinib", "CHEMBL3353410", LinkRank::Medium),
                hit("MONDO", "lung cancer", "MONDO_0008903", LinkRank::Low),
            ],
        )]);
        let refs = doc.entity_refs();
        let ctx = fx.context(&doc);

        let (kept, _) = GlobalStrategy::TfIdf { threshold: 7.0 }.run("osimertinib", &refs, &ctx.strategy());
        assert_eq!(kept, refs);
    }

    #[test]
    fn tf_idf_below_threshold_keeps_nothing() {
        let fx = Fixture::new();
        let doc = doc_with(vec![entity(
            "osimertinib",
            vec![hit("CHEMBL", "osimertinib", "CHEMBL3353410", LinkRank::Medium)],
        )]);
        let refs = doc.entity_refs();
        let ctx = fx.context(&doc);

        let outcome = run_global_chain(
            &[GlobalStrategy::TfIdf { threshold: 100.5 }],
            "osimertinib",
            &refs,
            &ctx.strategy(),
        );
        assert_eq!(outcome.strategy, NO_SUCCESSFUL_STRATEGY);
        assert_eq!(outcome.ambiguous, refs);
    }

    #[test]
    fn chain_reports_winning_strategy() {
        let fx = Fixture::new();
        let doc = doc_with(vec![entity(
            "osimertinib",
            vec![hit("CHEMBL", "osimertinib", "CHEMBL3353410", LinkRank::Medium)],
        )]);
        let refs = doc.entity_refs();
        let ctx = fx.context(&doc);
        let chain = [
            GlobalStrategy::KeepHighConfidenceHits {
                min_string_length: 3,
            },
            GlobalStrategy::TfIdf { threshold: 7.0 },
        ];

        let outcome = run_global_chain(&chain, "osimertinib", &refs, &ctx.strategy());
        assert_eq!(outcome.strategy, "tf_idf");
        assert_eq!(outcome.kept, refs);
    }
}
