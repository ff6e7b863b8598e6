use crate::backend::CollectionSet;
use crate::backend::Embedder;
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::error::RetrievalError;
use crate::keyword::QueryTokens;
use crate::normalize::is_malformed;
use crate::normalize::normalize_similarity;
use crate::score::fallback_similarity;
use crate::score::hybrid_score;
use futures::future::join_all;
use log::debug;
use log::warn;
use lore_protocol::DocType;
use lore_protocol::Query;
use lore_protocol::RawCandidate;
use lore_protocol::ScoredHit;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Everything one retrieval pass produced, including the degradation
/// markers the composer folds into bundle metadata. Zero surviving hits is
/// a first-class outcome here, never an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    pub hits_by_type: BTreeMap<DocType, Vec<ScoredHit>>,
    pub counts: BTreeMap<DocType, usize>,
    pub elapsed_ms: u64,
    pub skipped_candidates: usize,
    pub degraded_collections: Vec<DocType>,
    pub lexical_fallback: Vec<DocType>,
}

impl RetrievalOutcome {
    pub fn total_hits(&self) -> usize {
        self.hits_by_type.values().map(Vec::len).sum()
    }
}

/// Reject queries the engine must not accept: empty text or a zero limit.
pub fn validate_query(query: &Query) -> Result<()> {
    if query.raw_text.trim().is_empty() {
        return Err(RetrievalError::EmptyQuery);
    }
    if query.limit == 0 {
        return Err(RetrievalError::ZeroLimit);
    }
    Ok(())
}

struct CollectionPass {
    doc_type: DocType,
    hits: Vec<ScoredHit>,
    skipped: usize,
    degraded: bool,
    used_fallback: bool,
}

/// Queries every collection a request admits, scores and floors the
/// candidates, and assembles per-type ranked lists.
pub struct RetrievalCoordinator {
    config: RetrievalConfig,
    collections: CollectionSet,
    embedder: Option<Arc<dyn Embedder>>,
}

impl RetrievalCoordinator {
    pub fn new(
        config: RetrievalConfig,
        collections: CollectionSet,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(Self {
            config,
            collections,
            embedder,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The collections a query would touch: registered types minus whatever
    /// the doc-type filter excludes, in canonical order.
    pub fn searchable_types(&self, query: &Query) -> Vec<DocType> {
        self.collections
            .registered_types()
            .into_iter()
            .filter(|doc_type| query.includes(*doc_type))
            .collect()
    }

    /// Run one retrieval pass. Sub-retrievals across doc types run
    /// concurrently; they share no mutable state beyond disjoint slots of
    /// the result mapping.
    pub async fn retrieve(&self, query: &Query) -> RetrievalOutcome {
        let start = Instant::now();
        let tokens = QueryTokens::new(&query.raw_text);
        let limit = query.limit.max(1);

        let query_vector = match &self.embedder {
            Some(embedder) => match embedder.embed(&query.raw_text).await {
                Ok(vector) => Some(vector),
                Err(err) => {
                    warn!("embedding backend unavailable, using lexical fallback: {err:#}");
                    None
                }
            },
            None => None,
        };

        let passes = join_all(
            self.collections
                .registered_types()
                .into_iter()
                .filter(|doc_type| query.includes(*doc_type))
                .map(|doc_type| {
                    self.search_collection(doc_type, query_vector.as_deref(), &tokens, limit)
                }),
        )
        .await;

        let mut outcome = RetrievalOutcome::default();
        for pass in passes {
            outcome.counts.insert(pass.doc_type, pass.hits.len());
            outcome.skipped_candidates += pass.skipped;
            if pass.degraded {
                outcome.degraded_collections.push(pass.doc_type);
            }
            if pass.used_fallback {
                outcome.lexical_fallback.push(pass.doc_type);
            }
            outcome.hits_by_type.insert(pass.doc_type, pass.hits);
        }
        outcome.elapsed_ms = start.elapsed().as_millis() as u64;

        debug!(
            "retrieval finished: {} hits across {} collections in {}ms",
            outcome.total_hits(),
            outcome.counts.len(),
            outcome.elapsed_ms
        );
        outcome
    }

    async fn search_collection(
        &self,
        doc_type: DocType,
        query_vector: Option<&[f32]>,
        tokens: &QueryTokens,
        limit: usize,
    ) -> CollectionPass {
        let Some(collection) = self.collections.get(doc_type) else {
            return CollectionPass {
                doc_type,
                hits: Vec::new(),
                skipped: 0,
                degraded: true,
                used_fallback: false,
            };
        };

        let pool = self.config.candidate_pool_size;

        // Vector-backed path first; fall back to the lexical listing when
        // the vector side is unavailable or came back empty.
        if let Some(vector) = query_vector {
            match collection.nearest(vector, pool).await {
                Ok(candidates) if !candidates.is_empty() => {
                    let (hits, skipped) = self.score_vector_candidates(doc_type, candidates, tokens);
                    return CollectionPass {
                        doc_type,
                        hits: rank_and_cap(hits, limit),
                        skipped,
                        degraded: false,
                        used_fallback: false,
                    };
                }
                Ok(_) => {
                    debug!("collection {doc_type} returned no vector candidates, trying lexical");
                }
                Err(err) => {
                    warn!("collection {doc_type} unreachable, recording zero hits: {err:#}");
                    return CollectionPass {
                        doc_type,
                        hits: Vec::new(),
                        skipped: 0,
                        degraded: true,
                        used_fallback: false,
                    };
                }
            }
        }

        match collection.lexical_candidates(pool).await {
            Ok(candidates) => {
                let (hits, skipped) = self.score_lexical_candidates(doc_type, candidates, tokens);
                CollectionPass {
                    doc_type,
                    hits: rank_and_cap(hits, limit),
                    skipped,
                    degraded: false,
                    used_fallback: true,
                }
            }
            Err(err) => {
                warn!("collection {doc_type} unreachable, recording zero hits: {err:#}");
                CollectionPass {
                    doc_type,
                    hits: Vec::new(),
                    skipped: 0,
                    degraded: true,
                    used_fallback: false,
                }
            }
        }
    }

    fn score_vector_candidates(
        &self,
        doc_type: DocType,
        candidates: Vec<RawCandidate>,
        tokens: &QueryTokens,
    ) -> (Vec<ScoredHit>, usize) {
        let priority = self.config.priority_weights.for_doc_type(doc_type);
        let mut skipped = 0;
        let mut hits = Vec::new();
        for candidate in candidates {
            if is_malformed(&candidate) {
                skipped += 1;
                continue;
            }
            let similarity = normalize_similarity(&candidate);
            if similarity < self.config.min_similarity {
                continue;
            }
            let keyword_score = tokens.keyword_score(&candidate.payload.text);
            hits.push(ScoredHit {
                source_path: candidate.source_path,
                doc_type,
                similarity,
                keyword_score,
                priority_weight: priority,
                score: hybrid_score(doc_type, priority, similarity, keyword_score),
                snippet: make_snippet(&candidate.payload.text, self.config.snippet_max_chars),
                module_path: candidate.payload.module_path,
                line_count: candidate.payload.line_count,
            });
        }
        (hits, skipped)
    }

    fn score_lexical_candidates(
        &self,
        doc_type: DocType,
        candidates: Vec<RawCandidate>,
        tokens: &QueryTokens,
    ) -> (Vec<ScoredHit>, usize) {
        let priority = self.config.priority_weights.for_doc_type(doc_type);
        let mut skipped = 0;
        let mut hits = Vec::new();
        for candidate in candidates {
            if is_malformed(&candidate) {
                skipped += 1;
                continue;
            }
            let raw = tokens.overlap(&candidate.payload.text);
            let similarity = fallback_similarity(raw, tokens.token_count());
            if similarity < self.config.min_similarity {
                continue;
            }
            let keyword_score = tokens.keyword_score(&candidate.payload.text);
            hits.push(ScoredHit {
                source_path: candidate.source_path,
                doc_type,
                similarity,
                keyword_score,
                priority_weight: priority,
                score: hybrid_score(doc_type, priority, similarity, keyword_score),
                snippet: make_snippet(&candidate.payload.text, self.config.snippet_max_chars),
                module_path: candidate.payload.module_path,
                line_count: candidate.payload.line_count,
            });
        }
        (hits, skipped)
    }
}

/// Descending score; ties break by shorter source path, then
/// lexicographically, so results are reproducible across runs.
fn rank_and_cap(mut hits: Vec<ScoredHit>, limit: usize) -> Vec<ScoredHit> {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.source_path.len().cmp(&b.source_path.len()))
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
    hits.truncate(limit);
    hits
}

fn make_snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut snippet: String = trimmed.chars().take(max_chars).collect();
    snippet.truncate(snippet.trim_end().len());
    snippet.push_str("...");
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CollectionSearch;
    use async_trait::async_trait;
    use lore_protocol::CandidateDoc;
    use pretty_assertions::assert_eq;

    fn candidate(
        doc_type: DocType,
        id: &str,
        path: &str,
        distance: Option<f32>,
        text: &str,
    ) -> RawCandidate {
        RawCandidate {
            collection: doc_type,
            identifier: Some(id.to_string()),
            source_path: path.to_string(),
            distance,
            payload: CandidateDoc {
                text: text.to_string(),
                ..Default::default()
            },
        }
    }

    struct FixedCollection {
        doc_type: DocType,
        vector: anyhow::Result<Vec<RawCandidate>>,
        lexical: anyhow::Result<Vec<RawCandidate>>,
    }

    impl FixedCollection {
        fn ok(doc_type: DocType, vector: Vec<RawCandidate>) -> Self {
            Self {
                doc_type,
                vector: Ok(vector),
                lexical: Ok(Vec::new()),
            }
        }

        fn unreachable(doc_type: DocType) -> Self {
            Self {
                doc_type,
                vector: Err(anyhow::anyhow!("connection refused")),
                lexical: Err(anyhow::anyhow!("connection refused")),
            }
        }
    }

    #[async_trait]
    impl CollectionSearch for FixedCollection {
        fn doc_type(&self) -> DocType {
            self.doc_type
        }

        async fn nearest(
            &self,
            _query_vector: &[f32],
            _k: usize,
        ) -> anyhow::Result<Vec<RawCandidate>> {
            match &self.vector {
                Ok(candidates) => Ok(candidates.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }

        async fn lexical_candidates(&self, _k: usize) -> anyhow::Result<Vec<RawCandidate>> {
            match &self.lexical {
                Ok(candidates) => Ok(candidates.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.0; 8])
        }
    }

    fn coordinator_with(collections: CollectionSet, embedder: bool) -> RetrievalCoordinator {
        let embedder: Option<Arc<dyn Embedder>> = if embedder {
            Some(Arc::new(FixedEmbedder))
        } else {
            None
        };
        RetrievalCoordinator::new(RetrievalConfig::default(), collections, embedder)
            .expect("valid config")
    }

    #[tokio::test]
    async fn test_floor_drops_distant_candidates() {
        // distance 0.5 -> similarity ~0.667 survives; 2.0 -> ~0.333 dropped.
        let collections = CollectionSet::new().register(Arc::new(FixedCollection::ok(
            DocType::Code,
            vec![
                candidate(DocType::Code, "a", "src/a.rs", Some(0.5), "retry handler"),
                candidate(DocType::Code, "b", "src/b.rs", Some(2.0), "retry handler"),
            ],
        )));
        let coordinator = coordinator_with(collections, true);

        let outcome = coordinator
            .retrieve(&Query::new("retry handler", 10))
            .await;

        let hits = &outcome.hits_by_type[&DocType::Code];
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_path, "src/a.rs");
        assert!(hits[0].similarity >= 0.35);
        assert_eq!(outcome.counts[&DocType::Code], 1);
    }

    #[tokio::test]
    async fn test_ties_break_by_shorter_path() {
        let collections = CollectionSet::new().register(Arc::new(FixedCollection::ok(
            DocType::Code,
            vec![
                candidate(
                    DocType::Code,
                    "a",
                    "src/very/deep/module/auth.rs",
                    Some(0.5),
                    "session token",
                ),
                candidate(DocType::Code, "b", "src/auth.rs", Some(0.5), "session token"),
            ],
        )));
        let coordinator = coordinator_with(collections, true);

        let outcome = coordinator.retrieve(&Query::new("session token", 10)).await;
        let hits = &outcome.hits_by_type[&DocType::Code];
        assert_eq!(hits[0].source_path, "src/auth.rs");
        assert_eq!(hits[1].source_path, "src/very/deep/module/auth.rs");
    }

    #[test_log::test(tokio::test)]
    async fn test_unreachable_collection_degrades_not_fails() {
        let collections = CollectionSet::new()
            .register(Arc::new(FixedCollection::ok(
                DocType::Code,
                vec![candidate(
                    DocType::Code,
                    "a",
                    "src/a.rs",
                    Some(0.1),
                    "retry handler",
                )],
            )))
            .register(Arc::new(FixedCollection::unreachable(DocType::Test)));
        let coordinator = coordinator_with(collections, true);

        let outcome = coordinator.retrieve(&Query::new("retry handler", 10)).await;
        assert_eq!(outcome.counts[&DocType::Code], 1);
        assert_eq!(outcome.counts[&DocType::Test], 0);
        assert_eq!(outcome.degraded_collections, vec![DocType::Test]);
    }

    #[tokio::test]
    async fn test_lexical_fallback_without_embedder() {
        let mut collection = FixedCollection::ok(DocType::Code, Vec::new());
        collection.lexical = Ok(vec![candidate(
            DocType::Code,
            "a",
            "src/retry.rs",
            None,
            "retry handler with exponential backoff",
        )]);
        let collections = CollectionSet::new().register(Arc::new(collection));
        let coordinator = coordinator_with(collections, false);

        let outcome = coordinator.retrieve(&Query::new("retry handler", 10)).await;
        assert_eq!(outcome.lexical_fallback, vec![DocType::Code]);
        let hits = &outcome.hits_by_type[&DocType::Code];
        assert_eq!(hits.len(), 1);
        // 2 matched tokens / (2 * 2.5) = 0.4, above the floor.
        assert!((hits[0].similarity - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_vector_results_fall_back_to_lexical() {
        let mut collection = FixedCollection::ok(DocType::Skill, Vec::new());
        collection.lexical = Ok(vec![candidate(
            DocType::Skill,
            "s",
            "skills/retry.md",
            None,
            "retry handler recipe",
        )]);
        let collections = CollectionSet::new().register(Arc::new(collection));
        let coordinator = coordinator_with(collections, true);

        let outcome = coordinator.retrieve(&Query::new("retry handler", 10)).await;
        assert_eq!(outcome.lexical_fallback, vec![DocType::Skill]);
        assert_eq!(outcome.counts[&DocType::Skill], 1);
    }

    #[tokio::test]
    async fn test_malformed_candidates_skipped_and_counted() {
        let mut malformed = candidate(DocType::Code, "", "src/a.rs", Some(0.1), "retry");
        malformed.identifier = None;
        let collections = CollectionSet::new().register(Arc::new(FixedCollection::ok(
            DocType::Code,
            vec![
                malformed,
                candidate(DocType::Code, "b", "src/b.rs", Some(0.1), "retry handler"),
            ],
        )));
        let coordinator = coordinator_with(collections, true);

        let outcome = coordinator.retrieve(&Query::new("retry handler", 10)).await;
        assert_eq!(outcome.skipped_candidates, 1);
        assert_eq!(outcome.counts[&DocType::Code], 1);
    }

    #[tokio::test]
    async fn test_per_type_lists_capped_at_limit() {
        let candidates: Vec<RawCandidate> = (0..20)
            .map(|i| {
                candidate(
                    DocType::Code,
                    &format!("id-{i}"),
                    &format!("src/module_{i:02}.rs"),
                    Some(0.1 + i as f32 * 0.01),
                    "retry handler",
                )
            })
            .collect();
        let collections =
            CollectionSet::new().register(Arc::new(FixedCollection::ok(DocType::Code, candidates)));
        let coordinator = coordinator_with(collections, true);

        let outcome = coordinator.retrieve(&Query::new("retry handler", 5)).await;
        assert_eq!(outcome.hits_by_type[&DocType::Code].len(), 5);
    }

    #[tokio::test]
    async fn test_doc_type_filter_limits_collections() {
        let collections = CollectionSet::new()
            .register(Arc::new(FixedCollection::ok(
                DocType::Code,
                vec![candidate(DocType::Code, "a", "src/a.rs", Some(0.1), "retry")],
            )))
            .register(Arc::new(FixedCollection::ok(
                DocType::Test,
                vec![candidate(
                    DocType::Test,
                    "t",
                    "tests/a.rs",
                    Some(0.1),
                    "retry",
                )],
            )));
        let coordinator = coordinator_with(collections, true);

        let mut query = Query::new("retry", 10);
        query.doc_type_filter = Some([DocType::Test].into());
        let outcome = coordinator.retrieve(&query).await;

        assert!(!outcome.hits_by_type.contains_key(&DocType::Code));
        assert_eq!(outcome.counts[&DocType::Test], 1);
    }

    #[test]
    fn test_validate_query() {
        assert!(validate_query(&Query::new("retry handler", 10)).is_ok());
        assert!(validate_query(&Query::new("   ", 10)).is_err());
        assert!(validate_query(&Query::new("retry", 0)).is_err());
    }

    #[test]
    fn test_snippet_truncation() {
        let text = "x".repeat(500);
        let snippet = make_snippet(&text, 240);
        assert_eq!(snippet.chars().count(), 243);
        assert!(snippet.ends_with("..."));
        assert_eq!(make_snippet("short", 240), "short");
    }
}
