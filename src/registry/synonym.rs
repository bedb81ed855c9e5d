use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::document::SynonymData;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KbSynonyms {
    by_synonym: BTreeMap<String, BTreeSet<SynonymData>>,
    by_id: BTreeMap<String, BTreeSet<String>>,
}

/// Read-only synonym tables, one per knowledge base.
///
/// Maps `(knowledge base, synonym)` to identifier groups, and keeps the
/// reverse identifier → synonyms and global synonym → knowledge bases
/// indexes used by disambiguation. Synonym strings are expected to be
/// normalised already (see [`crate::text::normalize`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynonymRegistry {
    kbs: BTreeMap<String, KbSynonyms>,
    kbs_by_synonym: BTreeMap<String, BTreeSet<String>>,
}

impl SynonymRegistry {
    /// Creates a new registry builder.
    #[must_use]
    pub fn builder() -> SynonymRegistryBuilder {
        SynonymRegistryBuilder::default()
    }

    /// Identifier groups for `synonym` in knowledge base `source`.
    #[must_use]
    pub fn get(&self, source: &str, synonym: &str) -> BTreeSet<SynonymData> {
        self.kbs
            .get(source)
            .and_then(|kb| kb.by_synonym.get(synonym))
            .cloned()
            .unwrap_or_default()
    }

    /// Every synonym of identifier `idx` in knowledge base `source`.
    pub fn get_syns_for_id<'a>(&'a self, source: &str, idx: &str) -> impl Iterator<Item = &'a str> {
        self.kbs
            .get(source)
            .and_then(|kb| kb.by_id.get(idx))
            .into_iter()
            .flat_map(|syns| syns.iter().map(String::as_str))
    }

    /// Knowledge bases, across the whole registry, that use `synonym`.
    #[must_use]
    pub fn get_kbs_for_syn_global(&self, synonym: &str) -> BTreeSet<String> {
        self.kbs_by_synonym.get(synonym).cloned().unwrap_or_default()
    }

    /// The full synonym table of one knowledge base.
    #[must_use]
    pub fn get_all(&self, source: &str) -> Option<&BTreeMap<String, BTreeSet<SynonymData>>> {
        self.kbs.get(source).map(|kb| &kb.by_synonym)
    }

    /// Names of all loaded knowledge bases.
    pub fn get_loaded_kbs(&self) -> impl Iterator<Item = &str> {
        self.kbs.keys().map(String::as_str)
    }

    /// Number of loaded knowledge bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kbs.len()
    }

    /// Returns true if no knowledge base is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kbs.is_empty()
    }
}

/// Builder for [`SynonymRegistry`].
#[derive(Debug, Default)]
pub struct SynonymRegistryBuilder {
    registry: SynonymRegistry,
}

impl SynonymRegistryBuilder {
    /// Adds one synonym → identifier group entry for knowledge base `source`.
    #[must_use]
    pub fn synonym(mut self, source: &str, synonym: &str, data: SynonymData) -> Self {
        let kb = self.registry.kbs.entry(source.to_string()).or_default();
        for idx in &data.ids {
            kb.by_id
                .entry(idx.clone())
                .or_default()
                .insert(synonym.to_string());
        }
        kb.by_synonym
            .entry(synonym.to_string())
            .or_default()
            .insert(data);
        self.registry
            .kbs_by_synonym
            .entry(synonym.to_string())
            .or_default()
            .insert(source.to_string());
        self
    }

    /// Adds a whole knowledge base table.
    #[must_use]
    pub fn knowledge_base<I>(self, source: &str, table: I) -> Self
    where
        I: IntoIterator<Item = (String, SynonymData)>,
    {
        table
            .into_iter()
            .fold(self, |b, (synonym, data)| b.synonym(source, &synonym, data))
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> SynonymRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SynonymRegistry {
        SynonymRegistry::builder()
            .synonym("CHEMBL", "osimertinib", SynonymData::single("CHEMBL3353410", "CHEMBL", "exact"))
            .synonym("CHEMBL", "tagrisso", SynonymData::single("CHEMBL3353410", "CHEMBL", "exact"))
            .synonym(
                "OPENTARGETS_MOLECULE",
                "osimertinib",
                SynonymData::single("CHEMBL3353410", "OPENTARGETS_MOLECULE", "exact"),
            )
            .build()
    }

    #[test]
    fn get_returns_identifier_groups() {
        let reg = registry();
        let data = reg.get("CHEMBL", "tagrisso");
        assert_eq!(data.len(), 1);
        assert!(data.iter().next().unwrap().ids.contains("CHEMBL3353410"));
        assert!(reg.get("CHEMBL", "aspirin").is_empty());
        assert!(reg.get("MONDO", "tagrisso").is_empty());
    }

    #[test]
    fn reverse_index_lists_synonyms_for_id() {
        let reg = registry();
        let syns: Vec<&str> = reg.get_syns_for_id("CHEMBL", "CHEMBL3353410").collect();
        assert_eq!(syns, vec!["osimertinib", "tagrisso"]);
        assert_eq!(reg.get_syns_for_id("CHEMBL", "missing").count(), 0);
    }

    #[test]
    fn global_index_spans_knowledge_bases() {
        let reg = registry();
        let kbs = reg.get_kbs_for_syn_global("osimertinib");
        assert_eq!(kbs.len(), 2);
        assert!(kbs.contains("OPENTARGETS_MOLECULE"));
        assert_eq!(reg.get_loaded_kbs().count(), 2);
        assert_eq!(reg.get_all("CHEMBL").map(BTreeMap::len), Some(2));
    }
}
