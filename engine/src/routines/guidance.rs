use crate::routines::RoutineInput;
use lore_protocol::DocType;
use lore_protocol::IntentClass;
use lore_protocol::RoutineKind;
use lore_protocol::RoutineResult;
use serde_json::json;

/// Process hints keyed off the classification and the shape of the result
/// set, so the calling agent knows what to do next.
pub(crate) fn coaching_hints(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let mut guidance = Vec::new();

    if input.classification.confidence < 0.45 {
        guidance.push(
            "query intent was ambiguous; rephrase with concrete module or document names"
                .to_string(),
        );
    }

    if input.total_hits() == 0 {
        guidance.push(format!(
            "local corpus has no evidence for '{}'; confirm the functionality is genuinely new before building it",
            input.query.raw_text
        ));
    } else if input.hits(DocType::Skill).is_empty() {
        guidance.push(
            "no skill matched; check the skill catalog before hand-rolling a workflow".to_string(),
        );
    } else if let Some(best) = input.hits(DocType::Skill).first() {
        guidance.push(format!(
            "start from skill {} before writing new code",
            best.source_path
        ));
    }

    if input.classification.intent_class == IntentClass::Research {
        guidance.push(
            "exhaust the local evidence below before acting on external research results"
                .to_string(),
        );
    }

    Ok(RoutineResult::completed(
        RoutineKind::CoachingHints,
        guidance,
        json!({
            "intent": input.classification.intent_class,
            "confidence": input.classification.confidence,
        }),
    ))
}

/// Surface the governing documents a change must respect. Ranked
/// protocol-document hits become review obligations.
pub(crate) fn doc_compliance(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let doc_hits = input.hits(DocType::ProtocolDoc);
    let mut guidance = Vec::new();
    let mut documents = Vec::new();

    for hit in doc_hits.iter().take(3) {
        guidance.push(format!(
            "review {} before implementation (score {:.2})",
            hit.source_path, hit.score
        ));
        documents.push(json!({
            "source_path": hit.source_path,
            "score": hit.score,
        }));
    }

    if doc_hits.is_empty() {
        guidance.push(
            "no governing document matched; confirm there is no applicable policy before proceeding"
                .to_string(),
        );
    }

    Ok(RoutineResult::completed(
        RoutineKind::DocCompliance,
        guidance,
        json!({ "documents": documents }),
    ))
}
