//! Documents, mentions, candidates, and accepted mappings.
//!
//! A [`Document`] is the unit of disambiguation. It owns its sections, which
//! own their [`Entity`] mentions. Upstream linking populates each entity's
//! [`Hit`] set; the disambiguator only ever appends [`Mapping`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence::LinkRank;

/// Mapping-type tag for candidates that were inferred rather than matched.
pub const INFERRED: &str = "inferred";

/// Metadata key recording which strategy accepted a mapping.
pub const DISAMBIGUATED_BY: &str = "disambiguated_by";

/// Stable document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new random document ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a document ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open character span `[start, end)` within a section's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharSpan {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl CharSpan {
    /// Creates a span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The identifier group a synonym resolves to inside one knowledge base.
///
/// More than one identifier means the synonym is polysemous within that
/// ontology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SynonymData {
    /// Identifiers sharing this synonym.
    pub ids: BTreeSet<String>,
    /// Originating source table for each identifier.
    pub ids_to_source: BTreeMap<String, String>,
    /// Mapping-type tags, e.g. `"exact"` or [`INFERRED`].
    pub mapping_type: BTreeSet<String>,
}

impl SynonymData {
    /// Creates synonym data for a single identifier.
    #[must_use]
    pub fn single(
        idx: impl Into<String>,
        source: impl Into<String>,
        mapping_type: impl Into<String>,
    ) -> Self {
        let idx = idx.into();
        Self {
            ids: BTreeSet::from([idx.clone()]),
            ids_to_source: BTreeMap::from([(idx, source.into())]),
            mapping_type: BTreeSet::from([mapping_type.into()]),
        }
    }

    /// Creates synonym data for several identifiers from the same source table.
    #[must_use]
    pub fn group<I, S>(ids: I, source: &str, mapping_type: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        let ids_to_source = ids
            .iter()
            .map(|idx| (idx.clone(), source.to_string()))
            .collect();
        Self {
            ids,
            ids_to_source,
            mapping_type: BTreeSet::from([mapping_type.into()]),
        }
    }

    /// Returns the source table for `idx`, if recorded.
    #[must_use]
    pub fn source_of(&self, idx: &str) -> Option<&str> {
        self.ids_to_source.get(idx).map(String::as_str)
    }
}

/// One candidate produced by retrieval. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hit {
    /// Knowledge base the candidate came from.
    pub source: String,
    /// Normalised synonym string that matched.
    pub string_norm: String,
    /// Retrieval confidence.
    pub confidence: LinkRank,
    /// Identifier groups behind the matched synonym.
    pub syn_data: BTreeSet<SynonymData>,
}

impl Hit {
    /// Creates a hit.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        string_norm: impl Into<String>,
        confidence: LinkRank,
        syn_data: impl IntoIterator<Item = SynonymData>,
    ) -> Self {
        Self {
            source: source.into(),
            string_norm: string_norm.into(),
            confidence,
            syn_data: syn_data.into_iter().collect(),
        }
    }
}

/// A final accepted resolution of a mention.
///
/// Mappings are never mutated after creation; entities sharing a mention each
/// receive their own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Canonical label of the identifier.
    pub default_label: String,
    /// Source table the identifier belongs to.
    pub source: String,
    /// Knowledge base whose hit produced this mapping.
    pub data_origin: String,
    /// The identifier.
    pub idx: String,
    /// Mapping-type tags copied from the winning synonym data.
    pub mapping_type: BTreeSet<String>,
    /// Confidence assigned by the accepting strategy.
    pub confidence: LinkRank,
    /// Identifier attributes plus provenance (see [`DISAMBIGUATED_BY`]).
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Mapping {
    /// Returns the strategy that produced this mapping, if recorded.
    #[must_use]
    pub fn disambiguated_by(&self) -> Option<&str> {
        self.metadata.get(DISAMBIGUATED_BY).and_then(|v| v.as_str())
    }
}

/// A mention of a concept in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Producer namespace (e.g. the NER step name).
    pub namespace: String,
    /// Matched surface string.
    pub match_text: String,
    /// Class label such as `"gene"`, `"disease"`, `"drug"`.
    pub entity_class: String,
    /// Character spans of the mention.
    pub spans: Vec<CharSpan>,
    /// Candidates attached upstream.
    pub hits: BTreeSet<Hit>,
    /// Accepted resolutions, appended by the disambiguator.
    pub mappings: Vec<Mapping>,
}

impl Entity {
    /// Creates an entity with no hits or mappings.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        match_text: impl Into<String>,
        entity_class: impl Into<String>,
        spans: Vec<CharSpan>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            match_text: match_text.into(),
            entity_class: entity_class.into(),
            spans,
            hits: BTreeSet::new(),
            mappings: Vec::new(),
        }
    }

    /// Adds candidates, returning `self` for chaining.
    #[must_use]
    pub fn with_hits(mut self, hits: impl IntoIterator<Item = Hit>) -> Self {
        self.hits.extend(hits);
        self
    }

    /// Returns true if any hit carries the given rank.
    #[must_use]
    pub fn has_hit_with_rank(&self, rank: LinkRank) -> bool {
        self.hits.iter().any(|h| h.confidence == rank)
    }
}

/// A named section of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section name, e.g. `"title"` or `"body"`.
    pub name: String,
    /// Raw text.
    pub text: String,
    /// Mentions found in this section.
    pub entities: Vec<Entity>,
}

impl Section {
    /// Creates a section with no entities.
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// Position of an entity inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef {
    /// Section index.
    pub section: usize,
    /// Entity index within the section.
    pub entity: usize,
}

/// Ordered sequence of sections; the unit of disambiguation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub id: DocumentId,
    /// Sections in reading order.
    pub sections: Vec<Section>,
}

impl Document {
    /// Creates a document from sections.
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            id: DocumentId::new(),
            sections,
        }
    }

    /// Creates a single-section document.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Section::new("text", text)])
    }

    /// References to every entity, in section then mention order.
    #[must_use]
    pub fn entity_refs(&self) -> Vec<EntityRef> {
        self.sections
            .iter()
            .enumerate()
            .flat_map(|(s, section)| {
                (0..section.entities.len()).map(move |e| EntityRef { section: s, entity: e })
            })
            .collect()
    }

    /// Returns the referenced entity.
    ///
    /// # Panics
    /// Panics if `r` was not produced by this document.
    #[must_use]
    pub fn entity(&self, r: EntityRef) -> &Entity {
        &self.sections[r.section].entities[r.entity]
    }

    /// Returns the referenced entity mutably.
    ///
    /// # Panics
    /// Panics if `r` was not produced by this document.
    pub fn entity_mut(&mut self, r: EntityRef) -> &mut Entity {
        &mut self.sections[r.section].entities[r.entity]
    }

    /// Iterates over all entities.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.sections.iter().flat_map(|s| s.entities.iter())
    }

    /// `(source, idx)` pairs of every mapping accepted so far.
    #[must_use]
    pub fn mapped_ids(&self) -> BTreeSet<(String, String)> {
        self.entities()
            .flat_map(|e| e.mappings.iter())
            .map(|m| (m.source.clone(), m.idx.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(text: &str) -> Entity {
        Entity::new("test", text, "gene", vec![CharSpan::new(0, text.len())])
    }

    #[test]
    fn entity_refs_walk_sections_in_order() {
        let mut a = Section::new("title", "EGFR");
        a.entities.push(entity("EGFR"));
        let mut b = Section::new("body", "KRAS and BRAF");
        b.entities.push(entity("KRAS"));
        b.entities.push(entity("BRAF"));
        let doc = Document::new(vec![a, b]);

        let refs = doc.entity_refs();
        assert_eq!(refs.len(), 3);
        assert_eq!(doc.entity(refs[0]).match_text, "EGFR");
        assert_eq!(doc.entity(refs[2]).match_text, "BRAF");
    }

    #[test]
    fn hits_deduplicate_in_entity_set() {
        let hit = Hit::new(
            "ENSEMBL",
            "egfr",
            LinkRank::High,
            [SynonymData::single("ENSG00000146648", "ENSEMBL", "exact")],
        );
        let e = entity("EGFR").with_hits([hit.clone(), hit]);
        assert_eq!(e.hits.len(), 1);
        assert!(e.has_hit_with_rank(LinkRank::High));
        assert!(!e.has_hit_with_rank(LinkRank::Low));
    }

    #[test]
    fn synonym_group_records_source_per_id() {
        let data = SynonymData::group(["A", "B"], "KB", "exact");
        assert_eq!(data.ids.len(), 2);
        assert_eq!(data.source_of("B"), Some("KB"));
        assert_eq!(data.source_of("C"), None);
    }

    #[test]
    fn mapped_ids_collects_across_sections() {
        let mut doc = Document::from_text("EGFR");
        let mut e = entity("EGFR");
        e.mappings.push(Mapping {
            default_label: "EGFR".to_string(),
            source: "ENSEMBL".to_string(),
            data_origin: "ENSEMBL".to_string(),
            idx: "ENSG00000146648".to_string(),
            mapping_type: BTreeSet::new(),
            confidence: LinkRank::High,
            metadata: serde_json::Map::new(),
        });
        doc.sections[0].entities.push(e);

        let ids = doc.mapped_ids();
        assert!(ids.contains(&("ENSEMBL".to_string(), "ENSG00000146648".to_string())));
    }
}
