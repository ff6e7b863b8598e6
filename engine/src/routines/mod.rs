//! Analysis routines dispatched by the execution router.
//!
//! Every routine reads the already-scored hits and produces guidance
//! entries; none of them re-score or re-filter. Failures are reported to
//! the router as errors and surface as degraded entries, never as aborts.

mod guidance;
mod health;
mod reuse;

use lore_protocol::DocType;
use lore_protocol::IntentClassification;
use lore_protocol::Query;
use lore_protocol::RoutineKind;
use lore_protocol::RoutineResult;
use lore_protocol::ScoredHit;
use std::collections::BTreeMap;

/// Read-only view handed to every routine.
pub(crate) struct RoutineInput<'a> {
    pub hits_by_type: &'a BTreeMap<DocType, Vec<ScoredHit>>,
    pub query: &'a Query,
    pub classification: &'a IntentClassification,
    pub oversized_file_lines: u32,
    pub reinvention_similarity: f32,
}

impl RoutineInput<'_> {
    pub fn hits(&self, doc_type: DocType) -> &[ScoredHit] {
        self.hits_by_type
            .get(&doc_type)
            .map_or(&[], Vec::as_slice)
    }

    pub fn total_hits(&self) -> usize {
        self.hits_by_type.values().map(Vec::len).sum()
    }
}

/// Run one local (non-network) routine. The research lookup is async and
/// handled by the router itself.
pub(crate) fn run_local(kind: RoutineKind, input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    match kind {
        RoutineKind::HealthAnalysis => health::health_analysis(input),
        RoutineKind::OversizedFiles => health::oversized_files(input),
        RoutineKind::ModuleStructure => health::module_structure(input),
        RoutineKind::ReinventionDetection => reuse::reinvention_detection(input),
        RoutineKind::OrphanDetection => reuse::orphan_detection(input),
        RoutineKind::CoachingHints => guidance::coaching_hints(input),
        RoutineKind::DocCompliance => guidance::doc_compliance(input),
        RoutineKind::ResearchLookup => {
            anyhow::bail!("research lookup is network-bound and cannot run locally")
        }
    }
}

/// Top path segment under a conventional source root, used to group hits by
/// module when the indexer recorded no explicit module path.
pub(crate) fn module_of(hit: &ScoredHit) -> String {
    if let Some(module_path) = &hit.module_path {
        return module_path.clone();
    }
    let trimmed = hit
        .source_path
        .strip_prefix("src/")
        .unwrap_or(&hit.source_path);
    match trimmed.split('/').next() {
        Some(head) if !head.is_empty() => head.trim_end_matches(".rs").to_string(),
        _ => hit.source_path.clone(),
    }
}

/// File stem without extension, for matching code files against the tests
/// that mention them.
pub(crate) fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub fn hit(doc_type: DocType, path: &str, score: f32, similarity: f32) -> ScoredHit {
        ScoredHit {
            source_path: path.to_string(),
            doc_type,
            similarity,
            keyword_score: 0.5,
            priority_weight: 0.7,
            score,
            snippet: String::new(),
            module_path: None,
            line_count: None,
        }
    }

    pub fn input_fixture(
        hits_by_type: &BTreeMap<DocType, Vec<ScoredHit>>,
        query: &Query,
        classification: &IntentClassification,
    ) -> RoutineInput<'static> {
        // Leak fixture data; test-only.
        RoutineInput {
            hits_by_type: Box::leak(Box::new(hits_by_type.clone())),
            query: Box::leak(Box::new(query.clone())),
            classification: Box::leak(Box::new(classification.clone())),
            oversized_file_lines: 400,
            reinvention_similarity: 0.75,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_module_of_prefers_recorded_path() {
        let mut hit = testutil::hit(DocType::Code, "src/auth/session.rs", 0.8, 0.8);
        assert_eq!(module_of(&hit), "auth");

        hit.module_path = Some("auth::session".to_string());
        assert_eq!(module_of(&hit), "auth::session");
    }

    #[test]
    fn test_module_of_top_level_file() {
        let hit = testutil::hit(DocType::Code, "src/lib.rs", 0.8, 0.8);
        assert_eq!(module_of(&hit), "lib");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("src/auth/session.rs"), "session");
        assert_eq!(file_stem("session.rs"), "session");
        assert_eq!(file_stem("Makefile"), "Makefile");
    }
}
