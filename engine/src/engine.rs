use crate::compose::compose;
use crate::compose::compose_error;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::error::Result;
use crate::intent::IntentClassifier;
use crate::router::ExecutionRouter;
use crate::session::Session;
use futures::future::join_all;
use log::info;
use log::warn;
use lore_protocol::DocType;
use lore_protocol::ErrorCode;
use lore_protocol::Query;
use lore_protocol::QueryOutput;
use lore_protocol::ResultBundle;
use lore_protocol::SessionState;
use lore_retrieval::CollectionSet;
use lore_retrieval::Embedder;
use lore_retrieval::ResearchLookup;
use lore_retrieval::RetrievalCoordinator;
use lore_retrieval::RetrievalOutcome;
use lru::LruCache;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Mutex;

type CacheKey = (
    String,
    usize,
    Option<BTreeSet<DocType>>,
    BTreeMap<String, String>,
);

/// Snapshot of engine health, surfaced by the daemon's health endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: SessionState,
    pub collections: BTreeMap<DocType, bool>,
    pub vector_backend: bool,
}

/// The engine facade: owns the backend handles, the classifier, the
/// coordinator, the router, and the session state machine. Backend handles
/// are initialized once at bootstrap and read-mostly afterwards.
pub struct Engine {
    config: EngineConfig,
    classifier: IntentClassifier,
    coordinator: RetrievalCoordinator,
    router: ExecutionRouter,
    session: Mutex<Session>,
    cache: Mutex<LruCache<CacheKey, ResultBundle>>,
    availability: BTreeMap<DocType, bool>,
    vector_backend: bool,
}

impl Engine {
    /// Initialize backends and move the session to INDEX_READY. Partial
    /// initialization still succeeds: availability is probed and recorded
    /// per collection, never required globally.
    pub async fn bootstrap(
        config: EngineConfig,
        collections: CollectionSet,
        embedder: Option<Arc<dyn Embedder>>,
        research: Option<Arc<dyn ResearchLookup>>,
    ) -> Result<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let vector_backend = embedder.is_some();
        let probed = join_all(collections.registered_types().into_iter().map(|doc_type| {
            let collections = collections.clone();
            async move {
                let available = match collections.get(doc_type) {
                    Some(collection) => collection.probe().await,
                    None => false,
                };
                (doc_type, available)
            }
        }))
        .await;

        let availability: BTreeMap<DocType, bool> = probed.into_iter().collect();
        for (doc_type, available) in &availability {
            if !available {
                warn!("collection {doc_type} unavailable at bootstrap; continuing degraded");
            }
        }

        let cache_size = if config.enable_cache {
            config.cache_size
        } else {
            1
        };
        let cache = LruCache::new(
            NonZeroUsize::new(cache_size)
                .ok_or_else(|| EngineError::InvalidConfig("cache_size must be > 0".to_string()))?,
        );

        let router = ExecutionRouter::new(&config, research);
        let coordinator =
            RetrievalCoordinator::new(config.retrieval.clone(), collections, embedder)?;

        let mut session = Session::new();
        session.mark_index_ready()?;
        info!(
            "engine ready: {} collections ({} available), vector backend {}",
            availability.len(),
            availability.values().filter(|available| **available).count(),
            if vector_backend { "on" } else { "off" },
        );

        Ok(Self {
            config,
            classifier: IntentClassifier::new(),
            coordinator,
            router,
            session: Mutex::new(session),
            cache: Mutex::new(cache),
            availability,
            vector_backend,
        })
    }

    /// The inbound contract: one query in, one bundle out. Never panics and
    /// never returns a transport-level error; the worst outcome is an
    /// error-shaped bundle.
    pub async fn search(
        &self,
        raw_text: &str,
        limit: usize,
        doc_type_filter: Option<BTreeSet<DocType>>,
    ) -> QueryOutput {
        self.search_with_context(raw_text, limit, doc_type_filter, BTreeMap::new())
            .await
    }

    pub async fn search_with_context(
        &self,
        raw_text: &str,
        limit: usize,
        doc_type_filter: Option<BTreeSet<DocType>>,
        context: BTreeMap<String, String>,
    ) -> QueryOutput {
        let query = Query {
            raw_text: raw_text.to_string(),
            limit,
            doc_type_filter,
            context,
        };

        if let Err(err) = lore_retrieval::validate_query(&query) {
            return QueryOutput::Error(compose_error(ErrorCode::InvalidQuery, err.to_string()));
        }

        let cache_key = (
            query.raw_text.clone(),
            query.limit,
            query.doc_type_filter.clone(),
            query.context.clone(),
        );

        // A cache hit replays a frozen bundle; it is not a new search cycle
        // and does not advance the state machine.
        if self.config.enable_cache {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&cache_key) {
                let mut bundle = cached.clone();
                bundle.metadata.cache_hit = true;
                return QueryOutput::Bundle(Box::new(bundle));
            }
        }

        // The session is single-writer: one query cycle at a time drives
        // BOOTSTRAP/READY/EXECUTING/RESULT transitions.
        let mut session = self.session.lock().await;
        if let Err(err) = session.begin_search() {
            return QueryOutput::Error(compose_error(ErrorCode::Internal, err.to_string()));
        }

        let start = Instant::now();
        let classification = self.classifier.classify(&query.raw_text, &query.context);

        let budget = Duration::from_millis(self.config.query_timeout_ms);
        let outcome = match tokio::time::timeout(budget, self.coordinator.retrieve(&query)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "query exceeded {}ms; abandoning in-flight retrievals and composing partial results",
                    budget.as_millis()
                );
                self.timed_out_outcome(&query, start)
            }
        };

        let remaining = budget.saturating_sub(start.elapsed());
        let routine_results = if remaining.is_zero() {
            self.router
                .timed_out(classification.intent_class, "whole-query timeout")
        } else {
            match tokio::time::timeout(
                remaining,
                self.router
                    .route(&classification, &query, &outcome.hits_by_type),
            )
            .await
            {
                Ok(results) => results,
                Err(_) => self
                    .router
                    .timed_out(classification.intent_class, "whole-query timeout"),
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match compose(&query, &classification, &outcome, &routine_results, elapsed_ms) {
            Ok(bundle) => {
                let mark = if bundle.total_hits() > 0 {
                    session.mark_found()
                } else {
                    session.mark_missing()
                };
                if let Err(err) = mark {
                    return QueryOutput::Error(compose_error(ErrorCode::Internal, err.to_string()));
                }
                drop(session);

                if self.config.enable_cache {
                    let mut cache = self.cache.lock().await;
                    cache.put(cache_key, bundle.clone());
                }
                QueryOutput::Bundle(Box::new(bundle))
            }
            Err(err) => {
                // The only path into ERROR. Emit the error bundle, then
                // reset so the next query is not wedged.
                warn!("composition failed: {err}");
                let error_bundle = compose_error(ErrorCode::Internal, err.to_string());
                if session.mark_error().is_ok()
                    && let Err(reset_err) = session.reset_after_error()
                {
                    warn!("session reset failed: {reset_err}");
                }
                QueryOutput::Error(error_bundle)
            }
        }
    }

    pub async fn status(&self) -> EngineStatus {
        let session = self.session.lock().await;
        EngineStatus {
            state: session.state(),
            collections: self.availability.clone(),
            vector_backend: self.vector_backend,
        }
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        cache.clear();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Outcome stand-in when the whole-query budget expired before the
    /// coordinator finished: zero hits, every searched collection marked
    /// degraded.
    fn timed_out_outcome(&self, query: &Query, start: Instant) -> RetrievalOutcome {
        let searched = self.coordinator.searchable_types(query);
        let mut outcome = RetrievalOutcome {
            elapsed_ms: start.elapsed().as_millis() as u64,
            degraded_collections: searched.clone(),
            ..Default::default()
        };
        for doc_type in searched {
            outcome.counts.insert(doc_type, 0);
            outcome.hits_by_type.insert(doc_type, Vec::new());
        }
        outcome
    }
}
