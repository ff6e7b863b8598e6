use lore_protocol::DocType;
use serde::Deserialize;
use serde::Serialize;

/// Static per-collection authority weights, each in [0, 1].
///
/// Compliance documents outrank loosely-matched code, and curated skills
/// outrank raw code. A design knob supplied by configuration, not learned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriorityWeights {
    #[serde(default = "default_code_weight")]
    pub code: f32,

    #[serde(default = "default_protocol_doc_weight")]
    pub protocol_doc: f32,

    #[serde(default = "default_test_weight")]
    pub test: f32,

    #[serde(default = "default_skill_weight")]
    pub skill: f32,
}

fn default_code_weight() -> f32 {
    0.7
}

fn default_protocol_doc_weight() -> f32 {
    0.9
}

fn default_test_weight() -> f32 {
    0.6
}

fn default_skill_weight() -> f32 {
    0.85
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            code: default_code_weight(),
            protocol_doc: default_protocol_doc_weight(),
            test: default_test_weight(),
            skill: default_skill_weight(),
        }
    }
}

impl PriorityWeights {
    pub fn for_doc_type(&self, doc_type: DocType) -> f32 {
        match doc_type {
            DocType::Code => self.code,
            DocType::ProtocolDoc => self.protocol_doc,
            DocType::Test => self.test,
            DocType::Skill => self.skill,
        }
    }

    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("code", self.code),
            ("protocol_doc", self.protocol_doc),
            ("test", self.test),
            ("skill", self.skill),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "priority weight for {name} must be in [0.0, 1.0], got {value}"
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for the retrieval coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Minimum similarity a hit must reach to surface at all. Hits below the
    /// floor are dropped before ranking, not down-ranked.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Number of candidates requested from each collection before flooring.
    /// The per-doc-type result cap itself comes from the query.
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,

    #[serde(default)]
    pub priority_weights: PriorityWeights,

    /// Maximum snippet length carried on a hit.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
}

fn default_min_similarity() -> f32 {
    0.35
}

fn default_candidate_pool_size() -> usize {
    50
}

fn default_snippet_max_chars() -> usize {
    240
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            candidate_pool_size: default_candidate_pool_size(),
            priority_weights: PriorityWeights::default(),
            snippet_max_chars: default_snippet_max_chars(),
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(format!(
                "min_similarity must be in [0.0, 1.0], got {}",
                self.min_similarity
            ));
        }

        if self.candidate_pool_size == 0 {
            return Err("candidate_pool_size must be > 0".to_string());
        }

        if self.snippet_max_chars == 0 {
            return Err("snippet_max_chars must be > 0".to_string());
        }

        self.priority_weights.validate()
    }

    /// Config tuned for precision: higher floor, smaller pool.
    pub fn strict() -> Self {
        Self {
            min_similarity: 0.5,
            candidate_pool_size: 20,
            ..Default::default()
        }
    }

    /// Config tuned for recall: lower floor, larger pool.
    pub fn broad() -> Self {
        Self {
            min_similarity: 0.2,
            candidate_pool_size: 100,
            ..Default::default()
        }
    }
}
