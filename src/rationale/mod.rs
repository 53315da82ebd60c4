// src/rationale/mod.rs
// Match Rationale & Intro Runner (§4.H): dispatched by the Generation
// Scheduler for every match-typed generation; also owns the consent state
// machine wiring for inbound accept/reject callbacks. Grounded on the
// original source's `match_generation.py` / `match_intro_generation.py` for
// the two-phase sequencing and the `finally: restart_matching_loop` contract.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::warn;

use crate::agent::{AgentUsage, ConversationContext, LanguageAgent};
use crate::config::agent::AgentMode;
use crate::config::CONFIG;
use crate::domain::{Generation, GenerationUsage, MatchStatus, User};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::store::Store;
use crate::transport::{CallbackToken, ChatTransport, InlineKeyboard, KeyboardButton, MatchAction, SendOptions};

pub struct MatchRationaleRunner {
    store: Store,
    transport: Arc<dyn ChatTransport>,
    agent: Arc<dyn LanguageAgent>,
    matching_nudge: Arc<Notify>,
}

impl MatchRationaleRunner {
    pub fn new(store: Store, transport: Arc<dyn ChatTransport>, agent: Arc<dyn LanguageAgent>, matching_nudge: Arc<Notify>) -> Self {
        Self { store, transport, agent, matching_nudge }
    }

    /// Dispatched by the Scheduler. Restarts the Matching Engine loop when
    /// finished, regardless of outcome (§4.H, §4.G step 5).
    pub async fn run(&self, generation: &Generation) -> AppResult<GenerationUsage> {
        let result = self.run_inner(generation).await;
        self.matching_nudge.notify_one();
        result
    }

    async fn run_inner(&self, generation: &Generation) -> AppResult<GenerationUsage> {
        let match_id = generation.match_id().ok_or_else(|| AppError::Invariant("match generation with no match id".into()))?;
        let m = self.store.require_match(match_id).await?;
        let user_b_id = m.user_b_id.ok_or_else(|| AppError::Invariant(format!("match {} has no counterpart", match_id)))?;
        let user_a = self.store.require_user(m.user_a_id).await?;
        let user_b = self.store.require_user(user_b_id).await?;

        let mut usages = Vec::with_capacity(3);

        // Phase 1: rationale, persisted onto the match row.
        let (rationale, rationale_usage) = self
            .agent
            .run_rationale(&user_a.full_profile_for_rationale(), &user_b.full_profile_for_rationale())
            .await?;
        usages.push(rationale_usage);

        let bullets: String = rationale.key_alignments.iter().map(|b| format!("\n- {}", b)).collect();
        let rationale_text = format!("{}{}", rationale.explanation, bullets);
        self.store.set_match_rationale(match_id, &rationale_text).await?;
        self.store.set_match_status(match_id, MatchStatus::Qualified).await?;

        // Phase 2: a personalized intro per user.
        for (user, counterpart) in [(&user_a, &user_b), (&user_b, &user_a)] {
            let usage = self.send_intro(match_id, user, counterpart, &rationale_text).await?;
            usages.push(usage);
        }

        Ok(sum_usage(&usages))
    }

    async fn send_intro(&self, match_id: i64, user: &User, counterpart: &User, rationale_text: &str) -> AppResult<AgentUsage> {
        let chat = self.store.get_or_create_chat(user.telegram_id).await?;
        let system_message = format!(
            "You've been matched with another IT professional. About them:\n{}\n\nWhy you're a good match:\n{}\n\n\
             Write a short, warm introduction inviting them to connect.",
            counterpart.display_profile(),
            rationale_text
        );
        let context = match CONFIG.agent.mode {
            AgentMode::StatelessHistory => ConversationContext::History(chat.truncated_history(CONFIG.agent.history_window)),
            AgentMode::StatefulContinuation => ConversationContext::Continuation {
                token: chat.continuation_token.clone().unwrap_or_default(),
                history: chat.truncated_history(CONFIG.agent.history_window),
            },
        };
        let (response, usage) = self.agent.run_conversation(None, Some(&system_message), context).await?;

        let keyboard = InlineKeyboard::single_row(vec![
            KeyboardButton {
                label: "Accept".to_string(),
                callback_token: CallbackToken::Match { action: MatchAction::Accept, match_id },
            },
            KeyboardButton {
                label: "Pass".to_string(),
                callback_token: CallbackToken::Match { action: MatchAction::Reject, match_id },
            },
        ]);
        self.transport
            .send_text(user.telegram_id, &response.utterance, SendOptions { reply_to: None, keyboard: Some(keyboard) })
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        Ok(usage)
    }

    /// Applies an inbound accept/reject callback to the consent state
    /// machine (§4.H) and notifies both parties as the table dictates.
    pub async fn handle_consent(&self, match_id: i64, telegram_id: i64, accept: bool) -> AppResult<()> {
        let m = self.store.require_match(match_id).await?;
        let next = if accept { m.apply_accept(telegram_id) } else { m.apply_reject(telegram_id) };
        let Some(next_status) = next else {
            // Not this user's match, or the handshake already moved past
            // this state (e.g. a double-tap) — nothing to do.
            return Ok(());
        };

        self.store.set_match_status(match_id, next_status).await?;
        metrics::record_consent_outcome(next_status.as_str());

        let user_b_id = m.user_b_id.ok_or_else(|| AppError::Invariant(format!("match {} has no counterpart", match_id)))?;

        match next_status {
            MatchStatus::Connected => {
                let user_a = self.store.require_user(m.user_a_id).await?;
                let user_b = self.store.require_user(user_b_id).await?;
                self.notify_best_effort(m.user_a_id, &format!("You're connected! Here's who you matched with:\n\n{}", user_b.display_profile())).await;
                self.notify_best_effort(user_b_id, &format!("You're connected! Here's who you matched with:\n\n{}", user_a.display_profile())).await;
            }
            MatchStatus::Rejected => {
                self.notify_best_effort(m.user_a_id, "This match has been declined.").await;
                self.notify_best_effort(user_b_id, "This match has been declined.").await;
            }
            MatchStatus::AAccepted | MatchStatus::BAccepted => {
                self.notify_best_effort(telegram_id, "Got it, waiting for the other party.").await;
            }
            _ => {}
        }

        Ok(())
    }

    async fn notify_best_effort(&self, telegram_id: i64, text: &str) {
        if let Err(e) = self.transport.send_text(telegram_id, text, SendOptions::default()).await {
            warn!("failed to notify {} of consent outcome: {:#}", telegram_id, e);
        }
    }
}

fn sum_usage(usages: &[AgentUsage]) -> GenerationUsage {
    let cached_input_tokens: i64 = usages.iter().map(|u| u.cached_input_tokens).sum();
    let input_tokens: i64 = usages.iter().map(|u| u.input_tokens).sum();
    let output_tokens: i64 = usages.iter().map(|u| u.output_tokens).sum();
    let cost_usd: f64 = usages.iter().map(|u| u.cost_usd).sum();
    GenerationUsage {
        cached_input_tokens: Some(cached_input_tokens),
        uncached_input_tokens: Some(input_tokens - cached_input_tokens),
        output_tokens: Some(output_tokens),
        cost_usd: Some(cost_usd),
        provider_response_id: usages.last().and_then(|u| u.response_id.clone()),
    }
}
