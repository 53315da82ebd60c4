// src/agent/openai.rs
// OpenAI-backed `LanguageAgent`, grounded on the teacher's
// `llm::provider::openai` module (reqwest client, JSON request/response
// structs, a pricing submodule) generalized to this service's two call
// modes: the Chat Completions API for stateless-with-history, and the
// Responses API (`previous_response_id`) for stateful-continuation (§4.D).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::agent::pricing::AgentPricing;
use crate::agent::{
    classify_continuation_error, AgentUsage, ConversationContext, ConversationResponse, LanguageAgent,
    MatchRationale, ProfileExtract,
};
use crate::config::agent::{AgentConfig, AgentMode};
use crate::domain::HistoryMessage;
use crate::error::{AppError, AppResult};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

pub struct OpenAiAgent {
    client: Client,
    config: AgentConfig,
}

impl OpenAiAgent {
    pub fn new(config: AgentConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build OpenAI HTTP client");
        Self { client, config }
    }

    fn history_to_messages(history: &[HistoryMessage]) -> Vec<Value> {
        history
            .iter()
            .map(|m| {
                let role = match m {
                    HistoryMessage::User { .. } => "user",
                    HistoryMessage::Assistant { .. } => "assistant",
                    HistoryMessage::System { .. } => "system",
                };
                json!({ "role": role, "content": m.content() })
            })
            .collect()
    }

    /// Stateless-with-history call: client resends the full (truncated)
    /// history, plus the new prompt. Supports a prompt-cache key per chat.
    async fn run_stateless(
        &self,
        user_prompt: Option<&str>,
        system_message: Option<&str>,
        history: &[HistoryMessage],
        cache_key: Option<&str>,
    ) -> AppResult<(ConversationResponse, AgentUsage)> {
        let mut messages = Vec::new();
        if let Some(system_message) = system_message {
            messages.push(json!({ "role": "system", "content": system_message }));
        }
        messages.extend(Self::history_to_messages(history));
        if let Some(prompt) = user_prompt {
            messages.push(json!({ "role": "user", "content": prompt }));
        }

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "response_format": conversation_response_schema(),
        });
        if let Some(cache_key) = cache_key {
            body["prompt_cache_key"] = json!(cache_key);
        }

        let raw = self.post_json(CHAT_COMPLETIONS_URL, &body).await?;
        parse_chat_completion(&raw)
    }

    /// Stateful-continuation call: server holds prior turns behind
    /// `previous_response_id`. On a `ContinuationExpired` error the caller
    /// falls back to `run_stateless` for the same turn (§4.D, §7).
    async fn run_stateful(
        &self,
        user_prompt: Option<&str>,
        system_message: Option<&str>,
        previous_response_id: &str,
    ) -> AppResult<(ConversationResponse, AgentUsage)> {
        let input = match (system_message, user_prompt) {
            (Some(sys), Some(prompt)) => format!("{}\n\n{}", sys, prompt),
            (Some(sys), None) => sys.to_string(),
            (None, Some(prompt)) => prompt.to_string(),
            (None, None) => return Err(AppError::Invariant("stateful call with no input".into())),
        };

        let body = json!({
            "model": self.config.model,
            "input": input,
            "previous_response_id": previous_response_id,
            "store": true,
        });

        match self.post_json(RESPONSES_URL, &body).await {
            Ok(raw) => parse_responses_api(&raw),
            Err(AppError::Agent(message)) => {
                if let Some(AppError::ContinuationExpired) = classify_continuation_error(&message) {
                    Err(AppError::ContinuationExpired)
                } else {
                    Err(AppError::Agent(message))
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn run_stateful_fresh(
        &self,
        user_prompt: Option<&str>,
        system_message: Option<&str>,
    ) -> AppResult<(ConversationResponse, AgentUsage)> {
        let input = match (system_message, user_prompt) {
            (Some(sys), Some(prompt)) => format!("{}\n\n{}", sys, prompt),
            (Some(sys), None) => sys.to_string(),
            (None, Some(prompt)) => prompt.to_string(),
            (None, None) => return Err(AppError::Invariant("stateful call with no input".into())),
        };
        let body = json!({ "model": self.config.model, "input": input, "store": true });
        let raw = self.post_json(RESPONSES_URL, &body).await?;
        parse_responses_api(&raw)
    }

    async fn post_json(&self, url: &str, body: &Value) -> AppResult<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Agent(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AppError::Agent(e.to_string()))?;

        if !status.is_success() {
            warn!("OpenAI request to {} failed ({}): {}", url, status, text);
            return Err(AppError::Agent(text));
        }

        serde_json::from_str(&text).map_err(|e| AppError::Agent(format!("invalid JSON from OpenAI: {}", e)))
    }
}

#[async_trait]
impl LanguageAgent for OpenAiAgent {
    async fn run_conversation(
        &self,
        user_prompt: Option<&str>,
        system_message: Option<&str>,
        context: ConversationContext,
    ) -> AppResult<(ConversationResponse, AgentUsage)> {
        match (self.config.mode, context) {
            (AgentMode::StatelessHistory, ConversationContext::History(history)) => {
                self.run_stateless(user_prompt, system_message, &history, None).await
            }
            (AgentMode::StatefulContinuation, ConversationContext::Continuation { token, history }) => {
                if token.is_empty() {
                    // No prior turn to continue from — the chat's first message.
                    self.run_stateful_fresh(user_prompt, system_message).await
                } else {
                    match self.run_stateful(user_prompt, system_message, &token).await {
                        Err(AppError::ContinuationExpired) => {
                            // One-shot fallback to mode (1) with the truncated
                            // history injected, not a fresh stateful call with
                            // no context (§4.D, §7, §8 scenario 6). The
                            // resulting response carries no continuation id,
                            // which clears the stored token on the caller's
                            // next write.
                            debug!("continuation token expired, falling back to stateless history for this turn");
                            let (response, mut usage) =
                                self.run_stateless(user_prompt, system_message, &history, None).await?;
                            usage.response_id = None;
                            Ok((response, usage))
                        }
                        other => other,
                    }
                }
            }
            // A deployment mismatch between configured mode and the context
            // the caller built (e.g. no continuation token yet stored):
            // treat as a fresh call in whichever mode is actually runnable.
            (AgentMode::StatefulContinuation, ConversationContext::History(history)) => {
                self.run_stateless(user_prompt, system_message, &history, None).await
            }
            (AgentMode::StatelessHistory, ConversationContext::Continuation { history, .. }) => {
                self.run_stateless(user_prompt, system_message, &history, None).await
            }
        }
    }

    async fn run_rationale(
        &self,
        user_a_profile: &str,
        user_b_profile: &str,
    ) -> AppResult<(MatchRationale, AgentUsage)> {
        let prompt = format!(
            "Analyze these two profiles and explain why they're a good match.\n\n\
             User A Profile:\n{}\n\nUser B Profile:\n{}\n\n\
             Respond with an explanation (2-3 sentences, safe to show either side), \
             2-4 key_alignments bullets, and a confidence_score from 0.0 to 1.0.",
            user_a_profile, user_b_profile
        );

        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": rationale_response_schema(),
        });

        let raw = self.post_json(CHAT_COMPLETIONS_URL, &body).await?;
        parse_rationale(&raw)
    }

    async fn embed(&self, text: &str) -> AppResult<(Vec<f32>, f64)> {
        let body = json!({ "model": self.config.embedding_model, "input": text });
        let raw = self.post_json(EMBEDDINGS_URL, &body).await?;

        let embedding: Vec<f32> = raw["data"][0]["embedding"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
            .ok_or_else(|| AppError::Agent("embedding response missing data[0].embedding".into()))?;

        let tokens = raw["usage"]["total_tokens"].as_i64().unwrap_or(0);
        let cost_usd = AgentPricing::calculate_embedding_cost(tokens);
        Ok((embedding, cost_usd))
    }
}

fn conversation_response_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "conversation_response",
            "schema": {
                "type": "object",
                "properties": {
                    "utterance": { "type": "string" },
                    "profile": {
                        "type": ["object", "null"],
                        "properties": {
                            "is_seeker": { "type": "boolean" },
                            "is_provider": { "type": "boolean" },
                            "matching_summary": { "type": "string" },
                            "practical_context": { "type": ["string", "null"] },
                            "private_observations": { "type": ["string", "null"] },
                        },
                        "required": ["is_seeker", "is_provider", "matching_summary"],
                    },
                },
                "required": ["utterance"],
            },
        },
    })
}

fn rationale_response_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "match_rationale",
            "schema": {
                "type": "object",
                "properties": {
                    "explanation": { "type": "string" },
                    "key_alignments": { "type": "array", "items": { "type": "string" } },
                    "confidence_score": { "type": "number" },
                },
                "required": ["explanation", "key_alignments", "confidence_score"],
            },
        },
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    prompt_tokens: i64,
    completion_tokens: i64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawConversationResponse {
    utterance: String,
    #[serde(default)]
    profile: Option<ProfileExtract>,
}

fn parse_chat_completion(raw: &Value) -> AppResult<(ConversationResponse, AgentUsage)> {
    let content = raw["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| AppError::Agent("chat completion missing message content".into()))?;
    let parsed: RawConversationResponse =
        serde_json::from_str(content).map_err(|e| AppError::Agent(format!("invalid structured output: {}", e)))?;

    let usage: ChatCompletionUsage =
        serde_json::from_value(raw["usage"].clone()).map_err(|e| AppError::Agent(e.to_string()))?;
    let cached = usage.prompt_tokens_details.map(|d| d.cached_tokens).unwrap_or(0);
    let uncached = usage.prompt_tokens - cached;
    let cost = AgentPricing::calculate_cost(uncached, cached, usage.completion_tokens);

    Ok((
        ConversationResponse { utterance: parsed.utterance, profile: parsed.profile },
        AgentUsage {
            input_tokens: usage.prompt_tokens,
            cached_input_tokens: cached,
            output_tokens: usage.completion_tokens,
            response_id: raw["id"].as_str().map(str::to_string),
            cost_usd: cost,
        },
    ))
}

fn parse_responses_api(raw: &Value) -> AppResult<(ConversationResponse, AgentUsage)> {
    let content = raw["output_text"]
        .as_str()
        .ok_or_else(|| AppError::Agent("responses API missing output_text".into()))?;
    let parsed: RawConversationResponse =
        serde_json::from_str(content).map_err(|e| AppError::Agent(format!("invalid structured output: {}", e)))?;

    let input_tokens = raw["usage"]["input_tokens"].as_i64().unwrap_or(0);
    let cached = raw["usage"]["input_tokens_details"]["cached_tokens"].as_i64().unwrap_or(0);
    let output_tokens = raw["usage"]["output_tokens"].as_i64().unwrap_or(0);
    let cost = AgentPricing::calculate_cost(input_tokens - cached, cached, output_tokens);

    Ok((
        ConversationResponse { utterance: parsed.utterance, profile: parsed.profile },
        AgentUsage {
            input_tokens,
            cached_input_tokens: cached,
            output_tokens,
            response_id: raw["id"].as_str().map(str::to_string),
            cost_usd: cost,
        },
    ))
}

fn parse_rationale(raw: &Value) -> AppResult<(MatchRationale, AgentUsage)> {
    let content = raw["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| AppError::Agent("chat completion missing message content".into()))?;
    let rationale: MatchRationale =
        serde_json::from_str(content).map_err(|e| AppError::Agent(format!("invalid structured output: {}", e)))?;

    let usage: ChatCompletionUsage =
        serde_json::from_value(raw["usage"].clone()).map_err(|e| AppError::Agent(e.to_string()))?;
    let cached = usage.prompt_tokens_details.map(|d| d.cached_tokens).unwrap_or(0);
    let uncached = usage.prompt_tokens - cached;
    let cost = AgentPricing::calculate_cost(uncached, cached, usage.completion_tokens);

    Ok((
        rationale,
        AgentUsage {
            input_tokens: usage.prompt_tokens,
            cached_input_tokens: cached,
            output_tokens: usage.completion_tokens,
            response_id: raw["id"].as_str().map(str::to_string),
            cost_usd: cost,
        },
    ))
}
