use log::warn;
use lore_protocol::RawCandidate;

/// Convert a raw distance into a similarity in (0, 1].
///
/// `1 / (1 + d)` is monotonically decreasing in distance and needs no scale
/// normalization from the upstream metric. Fails closed: a missing or
/// negative distance is treated as distance zero (similarity 1.0).
pub fn normalize_similarity(candidate: &RawCandidate) -> f32 {
    let distance = match candidate.distance {
        Some(d) if d >= 0.0 && d.is_finite() => d,
        Some(d) => {
            warn!(
                "candidate {} in {} carried invalid distance {d}; treating as exact match",
                candidate.source_path, candidate.collection
            );
            0.0
        }
        None => {
            warn!(
                "candidate {} in {} carried no distance; treating as exact match",
                candidate.source_path, candidate.collection
            );
            0.0
        }
    };
    1.0 / (1.0 + distance)
}

/// A candidate without an identifier is malformed and must be skipped
/// individually rather than aborting the batch.
pub fn is_malformed(candidate: &RawCandidate) -> bool {
    candidate
        .identifier
        .as_deref()
        .is_none_or(|id| id.is_empty())
        || candidate.source_path.is_empty()
}
