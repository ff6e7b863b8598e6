/*!
# Hybrid Retrieval

Turns raw vector distances and lexical overlap into one ranked, floored list
per collection:

```text
Query
  ├─> embed once
  ├─> per collection (concurrent)
  │     ├─> nearest(k)           vector-backed path
  │     │     └─> normalize ─> score ─> floor ─> rank
  │     └─> lexical_candidates(k)   fallback when the vector path is
  │           └─> overlap ─> score ─> floor ─> rank   unavailable or empty
  └─> RetrievalOutcome (hits per type + counters)
```

Scoring model:
- similarity = 1 / (1 + distance), bounded in (0, 1]
- vector-backed score = 0.5·priority + 0.3·similarity + 0.2·keyword
  (skills shift to 0.6/0.3/0.1 to favor authority over textual overlap)
- fallback similarity = min(1, matched_tokens / max(1, tokens · 2.5))

An unreachable collection degrades to zero hits; it never fails the query.
*/

mod backend;
mod config;
mod coordinator;
mod error;
mod keyword;
mod normalize;
mod score;

pub use backend::{CollectionSearch, CollectionSet, Embedder, ResearchLookup};
pub use config::{PriorityWeights, RetrievalConfig};
pub use coordinator::{RetrievalCoordinator, RetrievalOutcome, validate_query};
pub use error::{Result, RetrievalError};
pub use keyword::QueryTokens;
pub use normalize::normalize_similarity;
pub use score::{fallback_similarity, hybrid_score};
