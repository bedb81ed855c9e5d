//! Resolves one candidate synonym to a single identifier group.

use tracing::{debug, info};

use super::resolvers::{NumberResolver, SubstringResolver};
use crate::document::SynonymData;
use crate::registry::{MetadataRegistry, SynonymRegistry};
use crate::text::normalize;

/// Ambiguous synonyms shorter than this are left unresolved rather than
/// tie-broken on label similarity.
const MIN_TIE_BREAK_LEN: usize = 5;

/// Per-mention resolver from `(synonym, knowledge base)` to the identifier
/// group the mention most likely means.
#[derive(Debug)]
pub struct SynonymDataResolver<'a> {
    mention: String,
    numbers: NumberResolver,
    substring: Option<SubstringResolver>,
    synonyms: &'a SynonymRegistry,
    metadata: &'a MetadataRegistry,
}

impl<'a> SynonymDataResolver<'a> {
    /// Creates a resolver for `mention`. With `check_substring`, candidates
    /// must also pass the [`SubstringResolver`].
    #[must_use]
    pub fn new(
        mention: &str,
        check_substring: bool,
        synonyms: &'a SynonymRegistry,
        metadata: &'a MetadataRegistry,
    ) -> Self {
        let mention = normalize(mention);
        Self {
            numbers: NumberResolver::new(&mention),
            substring: check_substring.then(|| SubstringResolver::new(&mention)),
            mention,
            synonyms,
            metadata,
        }
    }

    /// Returns the identifier group `synonym` resolves to in `source`, or
    /// `None` if it is filtered out or stays ambiguous.
    #[must_use]
    pub fn resolve(&self, synonym: &str, source: &str) -> Option<SynonymData> {
        if !self.numbers.accepts(synonym) {
            debug!(synonym, mention = %self.mention, "still ambiguous: number mismatch");
            return None;
        }
        if self.substring.as_ref().is_some_and(|s| !s.accepts(synonym)) {
            debug!(synonym, mention = %self.mention, "still ambiguous: substring not found");
            return None;
        }

        let groups = self.synonyms.get(source, synonym);
        match groups.len() {
            0 => None,
            1 => groups.into_iter().next(),
            n if synonym.chars().count() < MIN_TIE_BREAK_LEN => {
                info!(synonym, source, groups = n, "still ambiguous: synonym too short to tie-break");
                None
            }
            n => {
                info!(synonym, source, groups = n, "ambiguous synonym, attempting n-gram tie-break");
                self.ngram_tie_break(synonym, source, groups)
            }
        }
    }

    /// Picks the group holding the identifier whose normalised label is
    /// closest to `synonym` by bigram (Sørensen–Dice) distance. Ties keep the
    /// first group in set order.
    fn ngram_tie_break(
        &self,
        synonym: &str,
        source: &str,
        groups: impl IntoIterator<Item = SynonymData>,
    ) -> Option<SynonymData> {
        let mut best: Option<(f64, String, SynonymData)> = None;
        for data in groups {
            for idx in &data.ids {
                let label = normalize(self.metadata.default_label(source, idx).unwrap_or(idx));
                let distance = 1.0 - strsim::sorensen_dice(synonym, &label);
                if best.as_ref().map_or(true, |(d, _, _)| distance < *d) {
                    best = Some((distance, label, data.clone()));
                }
            }
        }

        best.map(|(distance, label, data)| {
            debug!(synonym, label = %label, distance, "n-gram tie-break");
            data
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registries() -> (SynonymRegistry, MetadataRegistry) {
        let syns = SynonymRegistry::builder()
            .synonym("CHEMBL", "osimertinib", SynonymData::single("CHEMBL3353410", "CHEMBL", "exact"))
            .synonym("MONDO", "diabetes type 2", SynonymData::single("MONDO_0005148", "MONDO", "exact"))
            .synonym("ENSEMBL", "mapk", SynonymData::single("ENSG00000109339", "ENSEMBL", "exact"))
            .synonym("ENSEMBL", "mapk", SynonymData::single("ENSG00000107643", "ENSEMBL", "exact"))
            .synonym("ENSEMBL", "jun kinase", SynonymData::single("ENSG00000109339", "ENSEMBL", "exact"))
            .synonym("ENSEMBL", "jun kinase", SynonymData::single("ENSG00000107643", "ENSEMBL", "exact"))
            .build();
        let meta = MetadataRegistry::builder()
            .label("ENSEMBL", "ENSG00000109339", "MAPK10")
            .label("ENSEMBL", "ENSG00000107643", "jun N-terminal kinase")
            .build();
        (syns, meta)
    }

    #[test]
    fn unique_group_resolves() {
        let (syns, meta) = registries();
        let r = SynonymDataResolver::new("Osimertinib", false, &syns, &meta);
        let data = r.resolve("osimertinib", "CHEMBL").unwrap();
        assert!(data.ids.contains("CHEMBL3353410"));
        assert!(r.resolve("osimertinib", "MONDO").is_none());
    }

    #[test]
    fn filters_apply_before_lookup() {
        let (syns, meta) = registries();
        let r = SynonymDataResolver::new("type 1 diabetes", false, &syns, &meta);
        assert!(r.resolve("diabetes type 2", "MONDO").is_none());

        let r = SynonymDataResolver::new("tagrisso", true, &syns, &meta);
        assert!(r.resolve("osimertinib", "CHEMBL").is_none());
    }

    #[test]
    fn short_ambiguous_synonym_stays_unresolved() {
        let (syns, meta) = registries();
        let r = SynonymDataResolver::new("MAPK", false, &syns, &meta);
        assert!(r.resolve("mapk", "ENSEMBL").is_none());
    }

    #[test]
    fn long_ambiguous_synonym_is_tie_broken_on_label() {
        let (syns, meta) = registries();
        let r = SynonymDataResolver::new("jun kinase", false, &syns, &meta);
        let data = r.resolve("jun kinase", "ENSEMBL").unwrap();
        assert!(data.ids.contains("ENSG00000107643"));
    }
}
