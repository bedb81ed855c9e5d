//! The document disambiguator.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::global::run_global_chain;
use super::kb::{run_kb_chain, KbStrategy};
use super::scorer::{CorpusScorer, DocumentContext};
use super::{GlobalStrategy, StrategyContext};
use crate::config::DisambiguatorConfig;
use crate::document::{Document, Entity, EntityRef};
use crate::error::LinkResult;
use crate::registry::{MetadataRegistry, SynonymRegistry};
use crate::text::{normalize, DefaultSymbolClassifier, SymbolClassifier};
use crate::vectorizer::TfIdfVectorizer;

/// Resolves every mention of a document to at most one identifier group.
///
/// Holds only read-only state, so one instance can serve many threads (see
/// [`crate::runtime::DisambiguationRuntime`]). Each [`run`](Self::run) is a
/// deterministic function of the document.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ontolink::{DisambiguatorConfig, Disambiguator, Document, MetadataRegistry, SynonymRegistry};
///
/// # fn main() -> ontolink::LinkResult<()> {
/// let synonyms = Arc::new(SynonymRegistry::default());
/// let metadata = Arc::new(MetadataRegistry::default());
/// let disambiguator = Disambiguator::new(DisambiguatorConfig::default(), synonyms, metadata)?;
///
/// let mut doc = Document::from_text("Osimertinib");
/// disambiguator.run(&mut doc);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Disambiguator<C: SymbolClassifier = DefaultSymbolClassifier> {
    config: DisambiguatorConfig,
    synonyms: Arc<SynonymRegistry>,
    metadata: Arc<MetadataRegistry>,
    vectorizer: Arc<TfIdfVectorizer>,
    scorer: CorpusScorer,
    classifier: C,
}

impl Disambiguator<DefaultSymbolClassifier> {
    /// Creates a disambiguator, loading the vectorizer from
    /// `config.vectorizer_path` or building it from `synonyms` if absent.
    ///
    /// # Errors
    /// Invalid configuration, or a vectorizer load/build failure.
    pub fn new(
        config: DisambiguatorConfig,
        synonyms: Arc<SynonymRegistry>,
        metadata: Arc<MetadataRegistry>,
    ) -> LinkResult<Self> {
        let config = config.validate()?;
        let vectorizer = Arc::new(TfIdfVectorizer::build_or_load(&config.vectorizer_path, &synonyms)?);
        Self::with_vectorizer(config, synonyms, metadata, vectorizer)
    }

    /// Creates a disambiguator over an already loaded vectorizer.
    ///
    /// # Errors
    /// Invalid configuration.
    pub fn with_vectorizer(
        config: DisambiguatorConfig,
        synonyms: Arc<SynonymRegistry>,
        metadata: Arc<MetadataRegistry>,
        vectorizer: Arc<TfIdfVectorizer>,
    ) -> LinkResult<Self> {
        Ok(Self {
            config: config.validate()?,
            scorer: CorpusScorer::new(Arc::clone(&vectorizer)),
            synonyms,
            metadata,
            vectorizer,
            classifier: DefaultSymbolClassifier,
        })
    }
}

impl<C: SymbolClassifier> Disambiguator<C> {
    /// Replaces the symbol-like mention classifier.
    #[must_use]
    pub fn with_classifier<D: SymbolClassifier>(self, classifier: D) -> Disambiguator<D> {
        Disambiguator {
            config: self.config,
            synonyms: self.synonyms,
            metadata: self.metadata,
            vectorizer: self.vectorizer,
            scorer: self.scorer,
            classifier,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &DisambiguatorConfig {
        &self.config
    }

    /// Disambiguates `doc` in place, appending mappings to its entities.
    ///
    /// Ordinary phrases are processed before symbol-like mentions, so a
    /// symbol can reuse an identifier its full name established. Entities
    /// left without a mapping could not be resolved.
    pub fn run(&self, doc: &mut Document) {
        let mentions: Vec<String> = doc.entities().map(|e| normalize(&e.match_text)).collect();
        let context = DocumentContext::new(&self.vectorizer, mentions.iter().map(String::as_str));

        let mut by_match: BTreeMap<String, Vec<EntityRef>> = BTreeMap::new();
        for r in doc.entity_refs() {
            by_match
                .entry(doc.entity(r).match_text.clone())
                .or_default()
                .push(r);
        }
        let (symbolic, non_symbolic): (BTreeMap<_, _>, BTreeMap<_, _>) = by_match
            .into_iter()
            .partition(|(text, _)| self.classifier.is_symbol_like(text));

        for (is_symbolic, groups) in [(false, non_symbolic), (true, symbolic)] {
            let cleared = self.global_pass(doc, &context, groups, is_symbolic);
            self.kb_pass(doc, &context, cleared, is_symbolic);
        }
    }

    fn strategy_context<'a>(&'a self, doc: &'a Document, context: &'a DocumentContext) -> StrategyContext<'a> {
        StrategyContext {
            document: doc,
            synonyms: &self.synonyms,
            metadata: &self.metadata,
            scorer: &self.scorer,
            context,
            allowed_overlaps: &self.config.allowed_overlaps,
        }
    }

    fn global_chain(&self, symbolic: bool) -> &[GlobalStrategy] {
        if symbolic {
            &self.config.symbolic_global
        } else {
            &self.config.non_symbolic_global
        }
    }

    fn kb_chain(&self, entity_class: &str, symbolic: bool) -> &[KbStrategy] {
        let (per_class, default) = if symbolic {
            (&self.config.symbolic_kb, &self.config.symbolic_default)
        } else {
            (&self.config.non_symbolic_kb, &self.config.non_symbolic_default)
        };
        per_class.get(entity_class).unwrap_or(default)
    }

    fn global_pass(
        &self,
        doc: &Document,
        context: &DocumentContext,
        groups: BTreeMap<String, Vec<EntityRef>>,
        symbolic: bool,
    ) -> Vec<EntityRef> {
        let ctx = self.strategy_context(doc, context);
        let chain = self.global_chain(symbolic);
        let mut cleared = Vec::new();
        for (mention, refs) in groups {
            let outcome = run_global_chain(chain, &mention, &refs, &ctx);
            info!(
                mention = %mention,
                symbolic,
                strategy = outcome.strategy,
                kept = outcome.kept.len(),
                "global disambiguation"
            );
            cleared.extend(outcome.kept);
        }
        cleared
    }

    fn kb_pass(&self, doc: &mut Document, context: &DocumentContext, cleared: Vec<EntityRef>, symbolic: bool) {
        let mut groups: BTreeMap<(String, String), Vec<EntityRef>> = BTreeMap::new();
        for r in cleared {
            let entity = doc.entity(r);
            groups
                .entry((entity.match_text.clone(), entity.entity_class.clone()))
                .or_default()
                .push(r);
        }

        for ((mention, class), refs) in groups {
            // Mappings applied by earlier groups are visible to later ones.
            let mappings = {
                let ctx = self.strategy_context(doc, context);
                let entities: Vec<&Entity> = refs.iter().map(|r| doc.entity(*r)).collect();
                run_kb_chain(self.kb_chain(&class, symbolic), &mention, &entities, &ctx)
            };

            if mappings.is_empty() {
                debug!(mention = %mention, class = %class, symbolic, "could not resolve");
                continue;
            }
            for r in refs {
                doc.entity_mut(r).mappings.extend(mappings.iter().cloned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::LinkRank;
    use crate::disambiguation::test_support::Fixture;
    use crate::document::{CharSpan, Hit, Section, SynonymData};

    fn disambiguator(fx: &Fixture) -> Disambiguator {
        Disambiguator::with_vectorizer(
            DisambiguatorConfig::default(),
            Arc::new(fx.synonyms.clone()),
            Arc::new(fx.metadata.clone()),
            Arc::clone(&fx.vectorizer),
        )
        .unwrap()
    }

    fn entity(text: &str, class: &str, hits: Vec<Hit>) -> Entity {
        Entity::new("ner", text, class, vec![CharSpan::new(0, text.len())]).with_hits(hits)
    }

    fn chembl(synonym: &str, confidence: LinkRank) -> Hit {
        Hit::new(
            "CHEMBL",
            synonym,
            confidence,
            [SynonymData::single("CHEMBL3353410", "CHEMBL", "exact")],
        )
    }

    struct AlwaysSymbol;

    impl SymbolClassifier for AlwaysSymbol {
        fn is_symbol_like(&self, _text: &str) -> bool {
            true
        }
    }

    #[test]
    fn unresolvable_mentions_get_no_mapping() {
        let fx = Fixture::new();
        let mut section = Section::new("text", "warfarin");
        section.entities.push(entity("warfarin", "drug", Vec::new()));
        let mut doc = Document::new(vec![section]);

        disambiguator(&fx).run(&mut doc);
        assert!(doc.entities().all(|e| e.mappings.is_empty()));
    }

    #[test]
    fn symbol_reuses_identifier_defined_by_phrase() {
        let fx = Fixture::new();
        let mut section = Section::new("text", "Tagrisso (OSI) was given");
        section
            .entities
            .push(entity("Tagrisso", "drug", vec![chembl("tagrisso", LinkRank::High)]));
        section
            .entities
            .push(entity("OSI", "drug", vec![chembl("osi", LinkRank::High)]));
        let mut doc = Document::new(vec![section]);

        disambiguator(&fx).run(&mut doc);
        let symbol = &doc.sections[0].entities[1];
        assert_eq!(symbol.mappings.len(), 1);
        assert_eq!(symbol.mappings[0].confidence, LinkRank::High);
        assert_eq!(symbol.mappings[0].disambiguated_by(), Some("require_full_definition"));
    }

    #[test]
    fn custom_classifier_routes_to_symbolic_chains() {
        let fx = Fixture::new();
        let mut section = Section::new("text", "Tagrisso");
        section
            .entities
            .push(entity("Tagrisso", "drug", vec![chembl("tagrisso", LinkRank::High)]));
        let mut doc = Document::new(vec![section]);

        // Symbolic drug chain only reuses existing mappings, so nothing resolves.
        disambiguator(&fx).with_classifier(AlwaysSymbol).run(&mut doc);
        assert!(doc.entities().all(|e| e.mappings.is_empty()));
    }

    #[test]
    fn unknown_class_uses_default_chain() {
        let fx = Fixture::new();
        let d = disambiguator(&fx);
        assert_eq!(d.kb_chain("cell_line", true), d.config().symbolic_default.as_slice());
        assert_eq!(d.kb_chain("drug", false).len(), 1);
    }
}
