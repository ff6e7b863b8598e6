use crate::routines::RoutineInput;
use crate::routines::module_of;
use lore_protocol::DocType;
use lore_protocol::RoutineKind;
use lore_protocol::RoutineResult;
use serde_json::json;
use std::collections::BTreeMap;

/// Aggregate per-module evidence: hit counts and average similarity. Low
/// average similarity across a module's hits means the corpus only loosely
/// covers what the query asked about.
pub(crate) fn health_analysis(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let mut per_module: BTreeMap<String, (usize, f32)> = BTreeMap::new();
    for hit in input.hits(DocType::Code) {
        let entry = per_module.entry(module_of(hit)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += hit.similarity;
    }

    let mut guidance = Vec::new();
    let mut modules = Vec::new();
    for (module, (count, similarity_sum)) in &per_module {
        let mean = similarity_sum / *count as f32;
        modules.push(json!({
            "module": module,
            "hits": count,
            "mean_similarity": mean,
        }));
        if *count >= 3 && mean >= 0.6 {
            guidance.push(format!(
                "module '{module}' already covers this area well ({count} matches, mean similarity {mean:.2})"
            ));
        } else if mean < 0.45 {
            guidance.push(format!(
                "module '{module}' is only loosely related (mean similarity {mean:.2}); verify before relying on it"
            ));
        }
    }
    if per_module.is_empty() {
        guidance.push("no code evidence to assess module health against".to_string());
    }

    Ok(RoutineResult::completed(
        RoutineKind::HealthAnalysis,
        guidance,
        json!({ "modules": modules }),
    ))
}

/// Flag hits whose backing file exceeds the configured line budget.
pub(crate) fn oversized_files(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let limit = input.oversized_file_lines;
    let mut oversized = Vec::new();
    let mut guidance = Vec::new();
    for hits in input.hits_by_type.values() {
        for hit in hits {
            if let Some(lines) = hit.line_count
                && lines > limit
            {
                guidance.push(format!(
                    "{} is oversized ({lines} lines > {limit}); split before extending it",
                    hit.source_path
                ));
                oversized.push(json!({
                    "source_path": hit.source_path,
                    "line_count": lines,
                }));
            }
        }
    }

    Ok(RoutineResult::completed(
        RoutineKind::OversizedFiles,
        guidance,
        json!({ "threshold": limit, "oversized": oversized }),
    ))
}

/// Describe how the evidence distributes across modules. A query whose hits
/// concentrate in one module should usually extend that module instead of
/// opening a parallel one.
pub(crate) fn module_structure(input: &RoutineInput<'_>) -> anyhow::Result<RoutineResult> {
    let mut per_module: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for hit in input.hits(DocType::Code) {
        per_module
            .entry(module_of(hit))
            .or_default()
            .push(hit.source_path.clone());
    }

    let mut guidance = Vec::new();
    if per_module.len() == 1
        && let Some((module, files)) = per_module.iter().next()
    {
        guidance.push(format!(
            "all code evidence sits in module '{module}' ({} files); extend it rather than adding a sibling",
            files.len()
        ));
    } else if per_module.len() > 3 {
        guidance.push(format!(
            "evidence is spread across {} modules; the concern may lack a single home",
            per_module.len()
        ));
    }

    let detail: Vec<_> = per_module
        .iter()
        .map(|(module, files)| json!({ "module": module, "files": files }))
        .collect();

    Ok(RoutineResult::completed(
        RoutineKind::ModuleStructure,
        guidance,
        json!({ "modules": detail }),
    ))
}
