use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::confidence::LinkRank;
use crate::document::Mapping;

/// Attribute key holding an identifier's canonical label.
pub const DEFAULT_LABEL: &str = "default_label";

/// Read-only descriptive attributes, keyed by `(knowledge base, identifier)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataRegistry {
    kbs: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
}

impl MetadataRegistry {
    /// Creates a new registry builder.
    #[must_use]
    pub fn builder() -> MetadataRegistryBuilder {
        MetadataRegistryBuilder::default()
    }

    /// Attributes of identifier `idx` in knowledge base `source`.
    #[must_use]
    pub fn get_by_idx(&self, source: &str, idx: &str) -> Option<&Map<String, Value>> {
        self.kbs.get(source).and_then(|kb| kb.get(idx))
    }

    /// Canonical label of `idx`, if recorded.
    #[must_use]
    pub fn default_label(&self, source: &str, idx: &str) -> Option<&str> {
        self.get_by_idx(source, idx)
            .and_then(|attrs| attrs.get(DEFAULT_LABEL))
            .and_then(Value::as_str)
    }

    /// All identifiers of one knowledge base with their attributes.
    pub fn iter_kb<'a>(
        &'a self,
        source: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Map<String, Value>)> {
        self.kbs
            .get(source)
            .into_iter()
            .flat_map(|kb| kb.iter().map(|(idx, attrs)| (idx.as_str(), attrs)))
    }

    /// Builds a [`Mapping`] for `idx`, copying its attributes into the
    /// mapping metadata.
    ///
    /// Attributes are looked up under `data_origin`, the knowledge base whose
    /// hit produced the identifier. A missing row still yields a mapping, with
    /// the identifier standing in for the label.
    #[must_use]
    pub fn create_mapping(
        &self,
        data_origin: &str,
        source: &str,
        idx: &str,
        mapping_type: BTreeSet<String>,
        confidence: LinkRank,
        additional_metadata: Map<String, Value>,
    ) -> Mapping {
        let mut metadata = self.get_by_idx(data_origin, idx).cloned().unwrap_or_else(|| {
            warn!(data_origin, idx, "no metadata row for mapped identifier");
            Map::new()
        });
        let default_label = match metadata.remove(DEFAULT_LABEL) {
            Some(Value::String(label)) => label,
            _ => idx.to_string(),
        };
        metadata.extend(additional_metadata);

        Mapping {
            default_label,
            source: source.to_string(),
            data_origin: data_origin.to_string(),
            idx: idx.to_string(),
            mapping_type,
            confidence,
            metadata,
        }
    }
}

/// Builder for [`MetadataRegistry`].
#[derive(Debug, Default)]
pub struct MetadataRegistryBuilder {
    registry: MetadataRegistry,
}

impl MetadataRegistryBuilder {
    /// Records the attributes of one identifier.
    #[must_use]
    pub fn record(mut self, source: &str, idx: &str, attributes: Map<String, Value>) -> Self {
        self.registry
            .kbs
            .entry(source.to_string())
            .or_default()
            .insert(idx.to_string(), attributes);
        self
    }

    /// Records an identifier with only a canonical label.
    #[must_use]
    pub fn label(self, source: &str, idx: &str, default_label: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert(DEFAULT_LABEL.to_string(), Value::String(default_label.to_string()));
        self.record(source, idx, attrs)
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> MetadataRegistry {
        self.registry
    }
}
