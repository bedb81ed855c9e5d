//! # ontolink - Candidate retrieval and document-level disambiguation
//!
//! ontolink links mentions of biomedical concepts in text to identifiers in
//! a closed set of ontologies ("knowledge bases"). Upstream retrieval proposes
//! candidates for every mention; this crate decides which candidate each
//! mention actually refers to, using the rest of the document as context.
//!
//! ## Core Concepts
//!
//! - **Registries**: read-only synonym and identifier-metadata tables, built once
//! - **CandidateIndex**: string (exact/fuzzy) and embedding retrieval over one knowledge base
//! - **Strategies**: global and per-knowledge-base disambiguation steps, composed into chains
//! - **Disambiguator**: runs the chains over a [`Document`] and appends [`Mapping`]s
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ontolink::{Disambiguator, DisambiguatorConfig, Document, MetadataRegistry, SynonymRegistry};
//!
//! let synonyms = Arc::new(SynonymRegistry::builder().build());
//! let metadata = Arc::new(MetadataRegistry::builder().build());
//! let disambiguator = Disambiguator::new(DisambiguatorConfig::default(), synonyms, metadata)?;
//!
//! let mut doc: Document = load_document_with_hits();
//! disambiguator.run(&mut doc);
//! for entity in doc.entities() {
//!     println!("{} -> {:?}", entity.match_text, entity.mappings);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod confidence;
pub mod document;
pub mod error;
pub mod text;

// Lookup tables, retrieval, and persistence
pub mod index;
pub mod registry;
pub mod storage;
pub mod vectorizer;

// Disambiguation
pub mod config;
pub mod disambiguation;
pub mod runtime;

pub use confidence::LinkRank;
pub use config::{DisambiguatorConfig, RuntimeConfig, SearchOptions};
pub use document::{CharSpan, Document, DocumentId, Entity, EntityRef, Hit, Mapping, Section, SynonymData};
pub use error::{ExecutionError, IndexError, LinkError, LinkResult, ValidationError};
pub use registry::{MetadataRegistry, SynonymRegistry};
pub use text::{normalize, DefaultSymbolClassifier, SymbolClassifier};
pub use vectorizer::TfIdfVectorizer;

pub use disambiguation::{Disambiguator, GlobalStrategy, KbStrategy};
pub use index::{
    expand_hits, CandidateIndex, DictionaryIndex, EmbeddingBackend, EmbeddingIndex, IndexKind, SearchHit,
};
pub use runtime::{BatchOutcome, DisambiguationRuntime, DocumentHandle};
