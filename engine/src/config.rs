use lore_protocol::RoutineKind;
use lore_retrieval::RetrievalConfig;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for the engine facade. The retrieval knobs nest the
/// coordinator's own config; the rest governs routing, timeouts, and the
/// query cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Budget for the network-bound research lookup.
    #[serde(default = "default_research_timeout_ms")]
    pub research_timeout_ms: u64,

    /// Whole-query budget. On expiry the engine abandons in-flight
    /// sub-retrievals and composes from whatever arrived.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Routines disabled by deployment policy. Disabling can only narrow
    /// the static routing table, never widen it.
    #[serde(default)]
    pub disabled_routines: Vec<RoutineKind>,

    /// File length above which the oversized-file routine flags a hit.
    #[serde(default = "default_oversized_file_lines")]
    pub oversized_file_lines: u32,

    /// Similarity at or above which a code or skill hit counts as evidence
    /// of existing equivalent functionality.
    #[serde(default = "default_reinvention_similarity")]
    pub reinvention_similarity: f32,

    /// Enable caching of result bundles for repeated queries.
    #[serde(default = "default_enable_cache")]
    pub enable_cache: bool,

    /// Cache size (number of queries to cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_research_timeout_ms() -> u64 {
    3_000
}

fn default_query_timeout_ms() -> u64 {
    10_000
}

fn default_oversized_file_lines() -> u32 {
    400
}

fn default_reinvention_similarity() -> f32 {
    0.75
}

fn default_enable_cache() -> bool {
    true
}

fn default_cache_size() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            research_timeout_ms: default_research_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            disabled_routines: Vec::new(),
            oversized_file_lines: default_oversized_file_lines(),
            reinvention_similarity: default_reinvention_similarity(),
            enable_cache: default_enable_cache(),
            cache_size: default_cache_size(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.retrieval.validate()?;

        if self.research_timeout_ms == 0 {
            return Err("research_timeout_ms must be > 0".to_string());
        }

        if self.query_timeout_ms == 0 {
            return Err("query_timeout_ms must be > 0".to_string());
        }

        if self.query_timeout_ms < self.research_timeout_ms {
            return Err(format!(
                "query_timeout_ms ({}) cannot be below research_timeout_ms ({})",
                self.query_timeout_ms, self.research_timeout_ms
            ));
        }

        if !(0.0..=1.0).contains(&self.reinvention_similarity) {
            return Err(format!(
                "reinvention_similarity must be in [0.0, 1.0], got {}",
                self.reinvention_similarity
            ));
        }

        if self.oversized_file_lines == 0 {
            return Err("oversized_file_lines must be > 0".to_string());
        }

        if self.enable_cache && self.cache_size == 0 {
            return Err("cache_size must be > 0 when caching is enabled".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_timeout_validation() {
        let mut config = EngineConfig::default();
        config.query_timeout_ms = 1_000;
        config.research_timeout_ms = 5_000;
        assert!(config.validate().is_err());

        config.research_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nested_retrieval_validation_propagates() {
        let mut config = EngineConfig::default();
        config.retrieval.min_similarity = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_validation() {
        let mut config = EngineConfig::default();
        config.cache_size = 0;
        assert!(config.validate().is_err());

        config.enable_cache = false;
        assert!(config.validate().is_ok());
    }
}
