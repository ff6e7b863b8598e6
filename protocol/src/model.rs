use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;

/// Logical partition of the corpus by content type.
///
/// Declaration order doubles as the deterministic cross-type ordering used
/// when hits from different collections carry identical scores.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Code,
    ProtocolDoc,
    Test,
    Skill,
}

impl DocType {
    pub const ALL: [DocType; 4] = [
        DocType::Code,
        DocType::ProtocolDoc,
        DocType::Test,
        DocType::Skill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Code => "code",
            DocType::ProtocolDoc => "protocol_doc",
            DocType::Test => "test",
            DocType::Skill => "skill",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted query. Immutable once constructed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub raw_text: String,

    /// Per-doc-type result cap. Always > 0.
    pub limit: usize,

    /// When present, only the listed collections are searched.
    pub doc_type_filter: Option<BTreeSet<DocType>>,

    /// Caller-supplied hints (current task, module being edited, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Query {
    pub fn new(raw_text: impl Into<String>, limit: usize) -> Self {
        Self {
            raw_text: raw_text.into(),
            limit,
            doc_type_filter: None,
            context: BTreeMap::new(),
        }
    }

    /// Whether the given collection participates in this query.
    pub fn includes(&self, doc_type: DocType) -> bool {
        match &self.doc_type_filter {
            Some(filter) => filter.contains(&doc_type),
            None => true,
        }
    }
}

/// Payload carried by a raw candidate: the matched text plus whatever
/// structural metadata the collection recorded at indexing time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidateDoc {
    /// The matched text. Used for the keyword signal and for snippets.
    #[serde(default)]
    pub text: String,

    /// Dotted module path, when the indexer could derive one.
    pub module_path: Option<String>,

    /// Total line count of the source file the candidate came from.
    pub line_count: Option<u32>,

    /// Human-readable title (document heading, skill name, ...).
    pub title: Option<String>,

    /// Collection-specific fields we pass through untouched.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Unscored nearest-neighbor result from a collaborator backend. Owned
/// transiently by the retrieval coordinator for the duration of one query.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawCandidate {
    pub collection: DocType,

    /// Stable identifier within the collection. A candidate without one is
    /// malformed and skipped.
    pub identifier: Option<String>,

    pub source_path: String,

    /// Distance from the query vector, lower is closer. Missing or negative
    /// values are normalized as distance zero rather than rejected.
    pub distance: Option<f32>,

    #[serde(default)]
    pub payload: CandidateDoc,
}

/// A normalized, scored candidate eligible for ranking. Never mutated after
/// creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoredHit {
    pub source_path: String,
    pub doc_type: DocType,

    /// In (0, 1]; strictly above the similarity floor for any surviving hit.
    pub similarity: f32,

    /// Fraction of query tokens found in the candidate text, in [0, 1].
    pub keyword_score: f32,

    /// Static per-collection authority weight, in [0, 1].
    pub priority_weight: f32,

    /// Combined ranking score, in [0, 1].
    pub score: f32,

    pub snippet: String,

    /// Carried through from the candidate payload for analysis routines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,

    /// Total line count of the backing file, when the indexer recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u32>,
}

/// The classified purpose of a query. Exactly one class per query.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum IntentClass {
    DocLookup,
    CodeLocation,
    ModuleHealth,
    Research,
    General,
}

impl IntentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentClass::DocLookup => "doc_lookup",
            IntentClass::CodeLocation => "code_location",
            IntentClass::ModuleHealth => "module_health",
            IntentClass::Research => "research",
            IntentClass::General => "general",
        }
    }
}

impl fmt::Display for IntentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the intent classifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IntentClassification {
    pub intent_class: IntentClass,

    /// In [0, 1].
    pub confidence: f32,

    /// Which lexical signals fired, for observability and tests.
    pub matched_signals: BTreeSet<String>,
}

/// Engine lifecycle states. Process-scoped, single-writer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Bootstrap,
    IndexReady,
    SearchExecuting,
    ResultFound,
    ResultMissing,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Analysis routines the execution router can dispatch.
///
/// `ResearchLookup` is the only network-bound routine and is reachable
/// exclusively through the `research` intent.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    HealthAnalysis,
    ReinventionDetection,
    OversizedFiles,
    ModuleStructure,
    CoachingHints,
    OrphanDetection,
    DocCompliance,
    ResearchLookup,
}

impl RoutineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineKind::HealthAnalysis => "health_analysis",
            RoutineKind::ReinventionDetection => "reinvention_detection",
            RoutineKind::OversizedFiles => "oversized_files",
            RoutineKind::ModuleStructure => "module_structure",
            RoutineKind::CoachingHints => "coaching_hints",
            RoutineKind::OrphanDetection => "orphan_detection",
            RoutineKind::DocCompliance => "doc_compliance",
            RoutineKind::ResearchLookup => "research_lookup",
        }
    }

    /// Whether the routine may touch the network.
    pub fn network_bound(&self) -> bool {
        matches!(self, RoutineKind::ResearchLookup)
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutineStatus {
    Completed,
    /// The routine failed or timed out; `note` explains why. Guidance from a
    /// degraded routine is best-effort and may be empty.
    Degraded,
}

/// Output of one analysis routine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoutineResult {
    pub routine: RoutineKind,
    pub status: RoutineStatus,

    /// Machine-actionable guidance lines.
    pub guidance: Vec<String>,

    /// Structured routine-specific detail.
    #[serde(default)]
    pub detail: serde_json::Value,

    /// Degradation reason, when status is `Degraded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RoutineResult {
    pub fn completed(routine: RoutineKind, guidance: Vec<String>, detail: serde_json::Value) -> Self {
        Self {
            routine,
            status: RoutineStatus::Completed,
            guidance,
            detail,
            note: None,
        }
    }

    pub fn degraded(routine: RoutineKind, note: impl Into<String>) -> Self {
        Self {
            routine,
            status: RoutineStatus::Degraded,
            guidance: Vec::new(),
            detail: serde_json::Value::Null,
            note: Some(note.into()),
        }
    }
}
