use crate::routines::RoutineInput;
use crate::routines::file_stem;
use lore_protocol::DocType;
use lore_protocol::RoutineKind;
use lore_protocol::RoutineResult;
use serde_json::json;

/// Detect existing equivalents before the caller writes new code. Code and
/// skill hits at or above the reinvention similarity threshold are strong
/// evidence the functionality already exists.
pub(crate) fn reinvention_detection(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let threshold = input.reinvention_similarity;
    let mut matches = Vec::new();
    let mut guidance = Vec::new();

    for doc_type in [DocType::Code, DocType::Skill] {
        for hit in input.hits(doc_type) {
            if hit.similarity >= threshold {
                guidance.push(format!(
                    "equivalent functionality likely exists in {} (similarity {:.2}); reuse it instead of reimplementing",
                    hit.source_path, hit.similarity
                ));
                matches.push(json!({
                    "source_path": hit.source_path,
                    "doc_type": doc_type,
                    "similarity": hit.similarity,
                }));
            }
        }
    }

    if matches.is_empty() && input.total_hits() > 0 {
        guidance.push(
            "no close equivalent found; nearby matches are loose, new code is reasonable"
                .to_string(),
        );
    }

    Ok(RoutineResult::completed(
        RoutineKind::ReinventionDetection,
        guidance,
        json!({ "threshold": threshold, "matches": matches }),
    ))
}

/// Flag code evidence no test evidence refers to. A code file whose stem
/// never shows up in any test hit is a candidate for orphaned code.
pub(crate) fn orphan_detection(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let test_hits = input.hits(DocType::Test);
    let mut orphans = Vec::new();
    let mut guidance = Vec::new();

    for hit in input.hits(DocType::Code) {
        let stem = file_stem(&hit.source_path);
        let referenced = test_hits.iter().any(|test| {
            test.source_path.contains(stem) || test.snippet.contains(stem)
        });
        if !referenced {
            orphans.push(json!({ "source_path": hit.source_path }));
        }
    }

    if !orphans.is_empty() {
        if test_hits.is_empty() {
            guidance.push(format!(
                "{} matched code file(s) have no test evidence in this result set; verify they are still exercised",
                orphans.len()
            ));
        } else {
            guidance.push(format!(
                "{} matched code file(s) are not referenced by any matched test; possible orphaned code",
                orphans.len()
            ));
        }
    }

    Ok(RoutineResult::completed(
        RoutineKind::OrphanDetection,
        guidance,
        json!({ "orphans": orphans }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::testutil::hit;
    use crate::routines::testutil::input_fixture;
    use lore_protocol::IntentClass;
    use lore_protocol::IntentClassification;
    use lore_protocol::Query;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    fn classification() -> IntentClassification {
        IntentClassification {
            intent_class: IntentClass::CodeLocation,
            confidence: 0.6,
            matched_signals: BTreeSet::new(),
        }
    }

    #[test]
    fn test_reinvention_flags_close_matches() {
        let mut hits_by_type = BTreeMap::new();
        hits_by_type.insert(
            DocType::Code,
            vec![
                hit(DocType::Code, "src/retry.rs", 0.9, 0.88),
                hit(DocType::Code, "src/upload.rs", 0.5, 0.4),
            ],
        );
        let query = Query::new("retry with backoff", 10);
        let class = classification();
        let input = input_fixture(&hits_by_type, &query, &class);

        let result = reinvention_detection(&input).expect("runs");
        assert_eq!(result.guidance.len(), 1);
        assert!(result.guidance[0].contains("src/retry.rs"));
    }

    #[test]
    fn test_reinvention_loose_matches_allow_new_code() {
        let mut hits_by_type = BTreeMap::new();
        hits_by_type.insert(
            DocType::Code,
            vec![hit(DocType::Code, "src/upload.rs", 0.5, 0.4)],
        );
        let query = Query::new("retry with backoff", 10);
        let class = classification();
        let input = input_fixture(&hits_by_type, &query, &class);

        let result = reinvention_detection(&input).expect("runs");
        assert!(result.guidance[0].contains("new code is reasonable"));
    }

    #[test]
    fn test_orphan_detection_cross_references_tests() {
        let mut hits_by_type = BTreeMap::new();
        hits_by_type.insert(
            DocType::Code,
            vec![
                hit(DocType::Code, "src/retry.rs", 0.8, 0.8),
                hit(DocType::Code, "src/upload.rs", 0.7, 0.7),
            ],
        );
        let mut test_hit = hit(DocType::Test, "tests/retry_test.rs", 0.7, 0.7);
        test_hit.snippet = "fn retry_backoff_works()".to_string();
        hits_by_type.insert(DocType::Test, vec![test_hit]);
        let query = Query::new("retry with backoff", 10);
        let class = classification();
        let input = input_fixture(&hits_by_type, &query, &class);

        let result = orphan_detection(&input).expect("runs");
        assert!(result.guidance[0].contains("1 matched code file"));
        assert_eq!(
            result.detail["orphans"][0]["source_path"],
            serde_json::json!("src/upload.rs")
        );
    }
}
