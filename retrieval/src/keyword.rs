use std::collections::BTreeSet;

/// Tokenized query, precomputed once per query and shared across all
/// candidate scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTokens {
    tokens: Vec<String>,
}

impl QueryTokens {
    pub fn new(raw_text: &str) -> Self {
        Self {
            tokens: tokenize(raw_text),
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Count of distinct query tokens present in the candidate text.
    pub fn overlap(&self, candidate_text: &str) -> usize {
        if self.tokens.is_empty() || candidate_text.is_empty() {
            return 0;
        }
        let candidate: BTreeSet<String> = tokenize(candidate_text).into_iter().collect();
        self.tokens
            .iter()
            .filter(|token| candidate.contains(*token))
            .count()
    }

    /// Overlap normalized by token count, in [0, 1].
    pub fn keyword_score(&self, candidate_text: &str) -> f32 {
        let raw = self.overlap(candidate_text) as f32;
        let count = self.token_count().max(1) as f32;
        (raw / count).clamp(0.0, 1.0)
    }
}

/// Lowercased alphanumeric tokens, underscores and hyphens kept so
/// identifiers like `retry_handler` match as written. Duplicates are
/// collapsed: each query token counts once.
fn tokenize(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect::<String>()
            .to_lowercase();
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.clone()) {
            tokens.push(cleaned);
        }
    }
    tokens
}
