use async_trait::async_trait;
use lore_protocol::DocType;
use lore_protocol::RawCandidate;
use std::collections::HashMap;
use std::sync::Arc;

/// Embedding backend. Consumed as a black box that turns text into a
/// fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// One corpus collection exposed by the vector store.
///
/// `nearest` is the vector-backed path; `lexical_candidates` hands back a
/// candidate listing (no distances) for the fallback path when the vector
/// side is unavailable or empty.
#[async_trait]
pub trait CollectionSearch: Send + Sync {
    fn doc_type(&self) -> DocType;

    async fn nearest(&self, query_vector: &[f32], k: usize) -> anyhow::Result<Vec<RawCandidate>>;

    async fn lexical_candidates(&self, k: usize) -> anyhow::Result<Vec<RawCandidate>>;

    /// Cheap availability check used at bootstrap. Collections that answer
    /// `false` still get queried later; availability is advisory.
    async fn probe(&self) -> bool {
        true
    }
}

/// Network-bound auxiliary lookup. Only ever invoked for research-intent
/// queries, under an explicit timeout.
#[async_trait]
pub trait ResearchLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> anyhow::Result<serde_json::Value>;
}

/// Registry of collection backends, keyed by doc type. Built once at
/// bootstrap and read-only afterwards.
#[derive(Clone, Default)]
pub struct CollectionSet {
    collections: HashMap<DocType, Arc<dyn CollectionSearch>>,
}

impl CollectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, collection: Arc<dyn CollectionSearch>) -> Self {
        self.collections.insert(collection.doc_type(), collection);
        self
    }

    pub fn get(&self, doc_type: DocType) -> Option<&Arc<dyn CollectionSearch>> {
        self.collections.get(&doc_type)
    }

    pub fn registered_types(&self) -> Vec<DocType> {
        // Iterate the canonical order, not map order, to keep results
        // reproducible across runs.
        DocType::ALL
            .into_iter()
            .filter(|doc_type| self.collections.contains_key(doc_type))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
