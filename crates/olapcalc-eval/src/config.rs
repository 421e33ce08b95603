//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the evaluation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cartesian product size above which the non-empty cross-join
    /// optimizer engages (when the evaluator is in non-empty mode).
    pub crossjoin_optimizer_size: usize,
    /// Enable per-expression result caching in the evaluator.
    pub enable_expression_cache: bool,
    /// Maximum cartesian product size (0 = unlimited).
    pub result_limit: usize,
    /// Surviving list size above which the optimizer gives up when pruning
    /// caused cache misses.
    pub punt_miss_count_list_size: usize,
    /// Wall-clock budget of one statement execution.
    #[serde(with = "millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Iteration budget of one statement execution.
    pub max_iterations: Option<u64>,
    /// Maximum nesting of calculated member evaluation.
    pub max_recursion_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crossjoin_optimizer_size: 0,
            enable_expression_cache: true,
            result_limit: 0,
            punt_miss_count_list_size: 1000,
            timeout: None,
            max_iterations: None,
            max_recursion_depth: 64,
        }
    }
}

impl EngineConfig {
    pub fn with_crossjoin_optimizer_size(mut self, size: usize) -> Self {
        self.crossjoin_optimizer_size = size;
        self
    }

    pub fn with_expression_cache(mut self, enabled: bool) -> Self {
        self.enable_expression_cache = enabled;
        self
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_punt_miss_count_list_size(mut self, size: usize) -> Self {
        self.punt_miss_count_list_size = size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Durations are written as integer milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_u64(d.as_millis() as u64),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
