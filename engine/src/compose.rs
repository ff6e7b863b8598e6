use crate::error::EngineError;
use crate::error::Result;
use lore_protocol::BUNDLE_SCHEMA_VERSION;
use lore_protocol::BundleMetadata;
use lore_protocol::DocType;
use lore_protocol::ErrorBundle;
use lore_protocol::ErrorCode;
use lore_protocol::ErrorPayload;
use lore_protocol::IntentClassification;
use lore_protocol::Query;
use lore_protocol::ResultBundle;
use lore_protocol::RoutineResult;
use lore_protocol::ScoredHit;
use lore_retrieval::RetrievalOutcome;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;

/// Assemble the versioned bundle from retrieval hits and routine outputs.
///
/// Pure aggregation: nothing here re-scores or re-filters. The canonical
/// nested mapping and the legacy flat aliases are written from the same
/// internal data, so old and new consumers read consistent values from
/// different keys. The bundle is frozen once returned.
pub(crate) fn compose(
    query: &Query,
    classification: &IntentClassification,
    outcome: &RetrievalOutcome,
    routine_results: &[RoutineResult],
    elapsed_ms: u64,
) -> Result<ResultBundle> {
    let structured_memory = build_structured_memory(classification, outcome, routine_results)?;
    let task_retrieval = build_task_retrieval(outcome)?;

    let best_code_hit = outcome
        .hits_by_type
        .get(&DocType::Code)
        .and_then(|hits| hits.first());

    Ok(ResultBundle {
        schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
        generated_at: OffsetDateTime::now_utc(),
        ok: true,
        task: query.context.get("task").cloned(),
        module_hint: query
            .context
            .get("module")
            .cloned()
            .or_else(|| best_code_hit.and_then(|hit| hit.module_path.clone())),
        module_path: best_code_hit.map(|hit| hit.source_path.clone()),
        structured_memory,
        task_retrieval,
        hits_by_type: outcome.hits_by_type.clone(),
        metadata: BundleMetadata {
            counts: outcome.counts.clone(),
            elapsed_ms,
            skipped_candidates: outcome.skipped_candidates,
            degraded_collections: outcome.degraded_collections.clone(),
            lexical_fallback: outcome.lexical_fallback.clone(),
            cache_hit: false,
        },
    })
}

/// The error-shaped bundle: `ok: false`, a diagnostic, no hit lists.
pub(crate) fn compose_error(code: ErrorCode, message: impl Into<String>) -> ErrorBundle {
    ErrorBundle {
        schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
        generated_at: OffsetDateTime::now_utc(),
        ok: false,
        error: ErrorPayload {
            code,
            message: message.into(),
        },
    }
}

fn build_structured_memory(
    classification: &IntentClassification,
    outcome: &RetrievalOutcome,
    routine_results: &[RoutineResult],
) -> Result<Map<String, Value>> {
    let mut memory = Map::new();
    memory.insert("intent".to_string(), to_value(classification)?);
    memory.insert(
        "session_outcome".to_string(),
        json!(if outcome.total_hits() > 0 {
            "result_found"
        } else {
            "result_missing"
        }),
    );

    let mut guidance = Map::new();
    for result in routine_results {
        guidance.insert(result.routine.as_str().to_string(), to_value(result)?);
    }
    memory.insert("guidance".to_string(), Value::Object(guidance));

    if outcome.total_hits() == 0 {
        // RESULT_MISSING is a first-class outcome: tell the caller what to
        // do instead of raising.
        memory.insert(
            "creation_guidance".to_string(),
            json!({
                "safe_to_create": true,
                "reason": "no hit survived the similarity floor in any searched collection",
            }),
        );
    }

    if !outcome.degraded_collections.is_empty() || !outcome.lexical_fallback.is_empty() {
        memory.insert(
            "degraded".to_string(),
            json!({
                "unreachable_collections": outcome.degraded_collections,
                "lexical_fallback": outcome.lexical_fallback,
            }),
        );
    }

    Ok(memory)
}

/// Legacy aliases of the canonical hit mapping. `results` is the flat
/// cross-type list, ordered by score descending with ties broken by doc
/// type declaration order, then shorter path, then lexicographic path.
/// The ordering is spelled out so it never depends on map iteration.
fn build_task_retrieval(outcome: &RetrievalOutcome) -> Result<Map<String, Value>> {
    let mut flat: Vec<&ScoredHit> = outcome.hits_by_type.values().flatten().collect();
    flat.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.doc_type.cmp(&b.doc_type))
            .then_with(|| a.source_path.len().cmp(&b.source_path.len()))
            .then_with(|| a.source_path.cmp(&b.source_path))
    });

    let mut retrieval = Map::new();
    retrieval.insert("results".to_string(), to_value(&flat)?);
    retrieval.insert("match_counts".to_string(), to_value(&outcome.counts)?);
    retrieval.insert("total".to_string(), json!(outcome.total_hits()));
    Ok(retrieval)
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| EngineError::Composition(err.to_string()))
}
