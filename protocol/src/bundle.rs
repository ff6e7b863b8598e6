use crate::model::DocType;
use crate::model::ScoredHit;
use crate::wire::ErrorPayload;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Schema tag carried by every successful or empty-result bundle. Schema
/// changes require a new tag, never silent field removal.
pub const BUNDLE_SCHEMA_VERSION: &str = "1.0";

/// Per-query counters attached to a bundle.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BundleMetadata {
    /// Surviving hit count per collection, including zero entries for
    /// collections that were searched but produced nothing.
    pub counts: BTreeMap<DocType, usize>,

    /// Wall-clock time spent on the whole query.
    pub elapsed_ms: u64,

    /// Malformed candidates dropped during normalization.
    #[serde(default)]
    pub skipped_candidates: usize,

    /// Collections that were unreachable and recorded zero hits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_collections: Vec<DocType>,

    /// Collections answered from the lexical fallback path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lexical_fallback: Vec<DocType>,

    #[serde(default)]
    pub cache_hit: bool,
}

/// The externally visible result artifact. Built fresh per query by the
/// output composer; append-then-freeze, never partially mutated afterwards.
///
/// `hits_by_type` is the canonical hit mapping; `task_retrieval` repeats the
/// same data under the legacy flat keys so older consumers keep working.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResultBundle {
    pub schema_version: String,

    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,

    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,

    /// Intent, session outcome, and per-routine guidance.
    pub structured_memory: Map<String, Value>,

    /// Legacy aliases: `results` (flat cross-type list), `match_counts`,
    /// `total`.
    pub task_retrieval: Map<String, Value>,

    pub hits_by_type: BTreeMap<DocType, Vec<ScoredHit>>,

    pub metadata: BundleMetadata,
}

impl ResultBundle {
    pub fn total_hits(&self) -> usize {
        self.hits_by_type.values().map(Vec::len).sum()
    }
}

/// The distinct shape emitted when a query ends in the error state: no hit
/// lists, just a diagnostic.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBundle {
    pub schema_version: String,

    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,

    /// Always false.
    pub ok: bool,

    pub error: ErrorPayload,
}

/// What a query returns: a result bundle (found or empty) or an error
/// bundle. Serialized untagged so consumers can keep dispatching on `ok`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum QueryOutput {
    Bundle(Box<ResultBundle>),
    Error(ErrorBundle),
}

impl QueryOutput {
    pub fn is_ok(&self) -> bool {
        match self {
            QueryOutput::Bundle(bundle) => bundle.ok,
            QueryOutput::Error(_) => false,
        }
    }

    pub fn as_bundle(&self) -> Option<&ResultBundle> {
        match self {
            QueryOutput::Bundle(bundle) => Some(bundle),
            QueryOutput::Error(_) => None,
        }
    }
}
