// src/agent/mod.rs
// Language Agent adapter (§4.D): two call modes behind one trait, grounded
// on the teacher's `llm::provider::LlmProvider` (a small trait hiding a
// concrete reqwest-based SDK) generalized from chat-completion-with-tools to
// this service's two conversation shapes.

pub mod openai;
pub mod pricing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::HistoryMessage;
use crate::error::{AppError, AppResult};

/// Token usage + response id returned by every agent call (§4.D).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentUsage {
    pub input_tokens: i64,
    pub cached_input_tokens: i64,
    pub output_tokens: i64,
    pub response_id: Option<String>,
    pub cost_usd: f64,
}

/// Profile extracted from a conversation turn (§3, §4.F.i).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileExtract {
    pub is_seeker: bool,
    pub is_provider: bool,
    pub matching_summary: String,
    pub practical_context: Option<String>,
    pub private_observations: Option<String>,
}

/// The chat agent's structured output (§4.F step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub utterance: String,
    pub profile: Option<ProfileExtract>,
}

/// The rationale agent's structured output (§4.H step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRationale {
    pub explanation: String,
    pub key_alignments: Vec<String>,
    pub confidence_score: f32,
}

/// Either mode the caller selects per deployment (§4.D), passed per call so
/// the fallback described in §4.D/§7 can switch modes mid-turn.
pub enum ConversationContext {
    /// Client resends a truncated history on every turn.
    History(Vec<HistoryMessage>),
    /// Server holds prior turns behind a continuation token. `history` rides
    /// along so a `ContinuationExpired` error can fall back to mode (1) for
    /// the same turn without losing the conversation (§4.D, §7, §8 scenario 6).
    Continuation { token: String, history: Vec<HistoryMessage> },
}

#[async_trait]
pub trait LanguageAgent: Send + Sync {
    /// Run the chat agent for a conversation turn. `system_message`, when
    /// present, is injected ahead of the user prompt (used by the match
    /// intro runner, §4.H step 2, where there is no fresh user prompt).
    async fn run_conversation(
        &self,
        user_prompt: Option<&str>,
        system_message: Option<&str>,
        context: ConversationContext,
    ) -> AppResult<(ConversationResponse, AgentUsage)>;

    /// Run the rationale agent over two profile summaries (§4.H step 1).
    async fn run_rationale(
        &self,
        user_a_profile: &str,
        user_b_profile: &str,
    ) -> AppResult<(MatchRationale, AgentUsage)>;

    /// Embed `matching_summary` into the fixed-dimension vector (§3).
    /// Returns the vector alongside its computed cost in USD.
    async fn embed(&self, text: &str) -> AppResult<(Vec<f32>, f64)>;
}

/// True when the provider's error body indicates an expired or missing
/// Responses-API continuation state (§4.D, §7): `container is expired` or a
/// bare `not found`. Shared by every agent implementation so the detection
/// logic has one home.
pub fn classify_continuation_error(message: &str) -> Option<AppError> {
    let lower = message.to_lowercase();
    if lower.contains("container is expired") || lower.contains("not found") {
        Some(AppError::ContinuationExpired)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_expired_container() {
        assert!(matches!(
            classify_continuation_error("Container is expired"),
            Some(AppError::ContinuationExpired)
        ));
    }

    #[test]
    fn classifies_not_found() {
        assert!(matches!(
            classify_continuation_error("Response not found"),
            Some(AppError::ContinuationExpired)
        ));
    }

    #[test]
    fn ignores_unrelated_errors() {
        assert!(classify_continuation_error("rate limit exceeded").is_none());
    }
}
