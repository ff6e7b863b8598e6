/*!
# Retrieval-and-Orchestration Engine

The engine turns one query into one versioned result bundle:

```text
query + context
  └─> IntentClassifier           lexical signals, fixed precedence
        └─> Session              INDEX_READY -> SEARCH_EXECUTING
              └─> RetrievalCoordinator     concurrent per-collection
                    └─> ExecutionRouter    intent-gated analysis routines
                          └─> compose      canonical + legacy keys
                                └─> RESULT_FOUND | RESULT_MISSING
```

Degradation rules: an unreachable collection records zero hits, a failed
routine records a degraded entry, a research timeout downgrades to
local-only results, and an unrecoverable composition failure emits an
error-shaped bundle then resets the session. Queries never crash the
process.
*/

mod compose;
mod config;
mod engine;
mod error;
mod intent;
mod router;
mod routines;
mod session;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStatus};
pub use error::{EngineError, Result};
pub use intent::IntentClassifier;
pub use router::{ExecutionRouter, routines_for};
pub use session::Session;
