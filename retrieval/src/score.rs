use lore_protocol::DocType;

/// Combine similarity, keyword overlap, and the collection's authority
/// weight into one ranking score.
///
/// Weights sum to 1.0 per mode, so the result stays in [0, 1] whenever each
/// input is in [0, 1]. Skill hits shift weight from textual overlap to
/// authority: a curated skill matters more than how its prose happened to be
/// worded.
pub fn hybrid_score(
    doc_type: DocType,
    priority_weight: f32,
    similarity: f32,
    keyword_score: f32,
) -> f32 {
    let (w_priority, w_similarity, w_keyword) = match doc_type {
        DocType::Skill => (0.6, 0.3, 0.1),
        _ => (0.5, 0.3, 0.2),
    };
    let score =
        w_priority * priority_weight + w_similarity * similarity + w_keyword * keyword_score;
    score.clamp(0.0, 1.0)
}

/// Similarity estimate for the lexical fallback path, used when the vector
/// backend is unavailable or returned no candidates.
///
/// `min(1, raw / max(1, tokens · 2.5))` is bounded and self-normalizing:
/// longer queries need proportionally more matching tokens to reach the same
/// similarity, so the estimate degrades gracefully with query length.
pub fn fallback_similarity(keyword_raw: usize, token_count: usize) -> f32 {
    let denominator = (token_count as f32 * 2.5).max(1.0);
    (keyword_raw as f32 / denominator).min(1.0)
}
