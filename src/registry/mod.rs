//! Process-wide lookup tables for synonyms and identifier metadata.
//!
//! Both registries are built once before any document is processed and then
//! shared read-only (typically behind an `Arc`) by indices and the
//! disambiguator.

mod metadata;
mod synonym;

pub use metadata::{MetadataRegistry, MetadataRegistryBuilder, DEFAULT_LABEL};
pub use synonym::{SynonymRegistry, SynonymRegistryBuilder};
