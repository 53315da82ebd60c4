// src/config/agent.rs
// Language agent configuration: provider credentials and call mode.

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_parsed_or, require_env};

/// Which of the two call modes described in §4.D the deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentMode {
    /// Client resends a truncated history on every turn.
    StatelessHistory,
    /// Server holds prior turns behind a continuation token.
    StatefulContinuation,
}

impl AgentMode {
    fn from_env_str(s: &str) -> Self {
        match s {
            "stateful" | "stateful-continuation" => AgentMode::StatefulContinuation,
            _ => AgentMode::StatelessHistory,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub mode: AgentMode,
    /// Number of most-recent history messages kept when truncating (N in §4.D).
    pub history_window: usize,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: require_env("OPENAI_API_KEY"),
            model: env_or("AGENT_MODEL", "gpt-5.1"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-large"),
            mode: AgentMode::from_env_str(&env_or("AGENT_MODE", "stateless-history")),
            history_window: env_parsed_or("AGENT_HISTORY_WINDOW", 30),
        }
    }
}
