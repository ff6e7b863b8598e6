use crate::config::EngineConfig;
use crate::routines::RoutineInput;
use crate::routines::run_local;
use log::debug;
use log::warn;
use lore_protocol::DocType;
use lore_protocol::IntentClass;
use lore_protocol::IntentClassification;
use lore_protocol::Query;
use lore_protocol::RoutineKind;
use lore_protocol::RoutineResult;
use lore_protocol::ScoredHit;
use lore_retrieval::ResearchLookup;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Static intent → routine table. Tagged dispatch, not string lookup: the
/// network-bound research lookup is reachable only through the `research`
/// row, and that is checkable right here.
pub const fn routines_for(intent: IntentClass) -> &'static [RoutineKind] {
    match intent {
        IntentClass::DocLookup => &[RoutineKind::DocCompliance, RoutineKind::CoachingHints],
        IntentClass::CodeLocation => &[
            RoutineKind::ReinventionDetection,
            RoutineKind::OrphanDetection,
        ],
        IntentClass::ModuleHealth => &[
            RoutineKind::HealthAnalysis,
            RoutineKind::OversizedFiles,
            RoutineKind::ModuleStructure,
            RoutineKind::OrphanDetection,
        ],
        IntentClass::Research => &[RoutineKind::ResearchLookup, RoutineKind::CoachingHints],
        IntentClass::General => &[
            RoutineKind::ReinventionDetection,
            RoutineKind::CoachingHints,
        ],
    }
}

/// Dispatches the intent-specific routine subset over the scored hits.
/// Individual routine failures become degraded entries; the router itself
/// never fails.
pub struct ExecutionRouter {
    research: Option<Arc<dyn ResearchLookup>>,
    research_timeout: Duration,
    disabled: Vec<RoutineKind>,
    oversized_file_lines: u32,
    reinvention_similarity: f32,
}

impl ExecutionRouter {
    pub fn new(config: &EngineConfig, research: Option<Arc<dyn ResearchLookup>>) -> Self {
        Self {
            research,
            research_timeout: Duration::from_millis(config.research_timeout_ms),
            disabled: config.disabled_routines.clone(),
            oversized_file_lines: config.oversized_file_lines,
            reinvention_similarity: config.reinvention_similarity,
        }
    }

    pub async fn route(
        &self,
        classification: &IntentClassification,
        query: &Query,
        hits_by_type: &BTreeMap<DocType, Vec<ScoredHit>>,
    ) -> Vec<RoutineResult> {
        let input = RoutineInput {
            hits_by_type,
            query,
            classification,
            oversized_file_lines: self.oversized_file_lines,
            reinvention_similarity: self.reinvention_similarity,
        };

        let mut results = Vec::new();
        for kind in routines_for(classification.intent_class) {
            if self.disabled.contains(kind) {
                debug!("routine {kind} disabled by configuration, skipping");
                continue;
            }
            let result = if kind.network_bound() {
                self.run_research(&query.raw_text).await
            } else {
                match run_local(*kind, &input) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!("routine {kind} failed, recording degraded entry: {err:#}");
                        RoutineResult::degraded(*kind, err.to_string())
                    }
                }
            };
            results.push(result);
        }
        results
    }

    /// Degraded stand-ins for the whole routine set, used when the caller's
    /// query budget expired before routing could run.
    pub(crate) fn timed_out(&self, intent: IntentClass, note: &str) -> Vec<RoutineResult> {
        routines_for(intent)
            .iter()
            .copied()
            .filter(|kind| !self.disabled.contains(kind))
            .map(|kind| RoutineResult::degraded(kind, note))
            .collect()
    }

    /// Network-bound auxiliary lookup, only ever reached through the
    /// research row of the routing table. Timeouts downgrade to a degraded
    /// entry; the query still completes on local hits.
    async fn run_research(&self, raw_text: &str) -> RoutineResult {
        let Some(research) = &self.research else {
            return RoutineResult::degraded(
                RoutineKind::ResearchLookup,
                "no research backend configured",
            );
        };

        match tokio::time::timeout(self.research_timeout, research.lookup(raw_text)).await {
            Ok(Ok(value)) => RoutineResult::completed(
                RoutineKind::ResearchLookup,
                vec!["external findings attached; verify against local constraints".to_string()],
                json!({ "findings": value }),
            ),
            Ok(Err(err)) => {
                warn!("research lookup failed, downgrading to local-only results: {err:#}");
                RoutineResult::degraded(RoutineKind::ResearchLookup, err.to_string())
            }
            Err(_) => {
                warn!(
                    "research lookup exceeded {}ms, downgrading to local-only results",
                    self.research_timeout.as_millis()
                );
                RoutineResult::degraded(
                    RoutineKind::ResearchLookup,
                    format!("timed out after {}ms", self.research_timeout.as_millis()),
                )
            }
        }
    }
}
