// src/config/matching.rs
// Matching Engine tunables.

use serde::{Deserialize, Serialize};

use super::helpers::env_parsed_or;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub similarity_threshold: f32,
    pub max_candidates: usize,
    pub retry_interval_secs: u64,
}

impl MatchingConfig {
    pub fn from_env() -> Self {
        Self {
            similarity_threshold: env_parsed_or("MATCH_SIMILARITY_THRESHOLD", 0.7),
            max_candidates: env_parsed_or("MATCH_MAX_CANDIDATES", 5),
            retry_interval_secs: env_parsed_or("MATCH_RETRY_INTERVAL_SECS", 1800),
        }
    }
}
