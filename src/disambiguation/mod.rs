//! Document-scoped disambiguation.
//!
//! The [`Disambiguator`] narrows each mention's candidates to at most one
//! identifier group per knowledge base in two passes:
//!
//! 1. **Global** ([`GlobalStrategy`]): per mention text, decide which entities
//!    are trustworthy enough to resolve at all.
//! 2. **Knowledge base** ([`KbStrategy`]): per `(mention text, entity class)`,
//!    pick the identifiers and append [`Mapping`](crate::document::Mapping)s.
//!
//! Strategies are closed enums dispatched by `match`; chains are ordered
//! lists of them, configured per entity class in
//! [`DisambiguatorConfig`](crate::config::DisambiguatorConfig).

mod engine;
mod global;
mod kb;
mod resolvers;
mod scorer;
mod synonym;

use std::collections::BTreeSet;

use crate::document::Document;
use crate::registry::{MetadataRegistry, SynonymRegistry};

pub use engine::Disambiguator;
pub use global::{kbs_are_compatible, run_global_chain, GlobalOutcome, GlobalStrategy, NO_SUCCESSFUL_STRATEGY};
pub use kb::{run_kb_chain, KbStrategy, Resolution};
pub use resolvers::{NumberResolver, SubstringResolver};
pub use scorer::{CorpusScorer, DocumentContext};
pub use synonym::SynonymDataResolver;

/// Read-only inputs shared by every strategy call on one document.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    /// The document being disambiguated, as of this call.
    pub document: &'a Document,
    /// Synonym tables.
    pub synonyms: &'a SynonymRegistry,
    /// Identifier attributes.
    pub metadata: &'a MetadataRegistry,
    /// Corpus scorer over the shared vectorizer.
    pub scorer: &'a CorpusScorer,
    /// The document's context vector.
    pub context: &'a DocumentContext,
    /// Knowledge-base groups treated as interchangeable.
    pub allowed_overlaps: &'a [BTreeSet<String>],
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::{CorpusScorer, DocumentContext, StrategyContext};
    use crate::config::DisambiguatorConfig;
    use crate::document::{Document, SynonymData};
    use crate::registry::{MetadataRegistry, SynonymRegistry};
    use crate::text::normalize;
    use crate::vectorizer::TfIdfVectorizer;

    /// Small drug/disease knowledge base shared by strategy tests.
    pub(crate) struct Fixture {
        pub synonyms: SynonymRegistry,
        pub metadata: MetadataRegistry,
        pub vectorizer: Arc<TfIdfVectorizer>,
        pub scorer: CorpusScorer,
        pub overlaps: Vec<BTreeSet<String>>,
    }

    pub(crate) struct FixtureContext<'a> {
        fixture: &'a Fixture,
        document: &'a Document,
        context: DocumentContext,
    }

    impl FixtureContext<'_> {
        pub(crate) fn strategy(&self) -> StrategyContext<'_> {
            StrategyContext {
                document: self.document,
                synonyms: &self.fixture.synonyms,
                metadata: &self.fixture.metadata,
                scorer: &self.fixture.scorer,
                context: &self.context,
                allowed_overlaps: &self.fixture.overlaps,
            }
        }
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let exact = |idx: &str, source: &str| SynonymData::single(idx, source, "exact");
            let synonyms = SynonymRegistry::builder()
                .synonym("CHEMBL", "osimertinib", exact("CHEMBL3353410", "CHEMBL"))
                .synonym("CHEMBL", "tagrisso", exact("CHEMBL3353410", "CHEMBL"))
                .synonym("CHEMBL", "aspirin", exact("CHEMBL25", "CHEMBL"))
                .synonym(
                    "OPENTARGETS_MOLECULE",
                    "osimertinib",
                    exact("CHEMBL3353410", "OPENTARGETS_MOLECULE"),
                )
                .synonym("MONDO", "lung cancer", exact("MONDO_0008903", "MONDO"))
                .synonym("MONDO", "lung carcinoma", exact("MONDO_0008903", "MONDO"))
                .build();
            let metadata = MetadataRegistry::builder()
                .label("CHEMBL", "CHEMBL3353410", "OSIMERTINIB")
                .label("CHEMBL", "CHEMBL25", "ASPIRIN")
                .label("OPENTARGETS_MOLECULE", "CHEMBL3353410", "OSIMERTINIB")
                .label("MONDO", "MONDO_0008903", "lung cancer")
                .build();
            Self::with_registries(synonyms, metadata)
        }

        pub(crate) fn with_registries(synonyms: SynonymRegistry, metadata: MetadataRegistry) -> Self {
            let corpus: Vec<&str> = synonyms
                .get_loaded_kbs()
                .filter_map(|kb| synonyms.get_all(kb))
                .flat_map(|t| t.keys().map(String::as_str))
                .collect();
            let vectorizer = Arc::new(TfIdfVectorizer::fit(&corpus));

            Self {
                scorer: CorpusScorer::new(Arc::clone(&vectorizer)),
                vectorizer,
                overlaps: DisambiguatorConfig::default().allowed_overlaps,
                synonyms,
                metadata,
            }
        }

        pub(crate) fn context<'a>(&'a self, document: &'a Document) -> FixtureContext<'a> {
            let mentions: Vec<String> = document.entities().map(|e| normalize(&e.match_text)).collect();
            FixtureContext {
                fixture: self,
                document,
                context: DocumentContext::new(&self.vectorizer, mentions.iter().map(String::as_str)),
            }
        }
    }
}
