// src/coalescer/chat_runner.rs
// Chat Generation Runner (§4.F steps 1-8 and §4.F.i), dispatched by the
// Generation Scheduler for every chat-typed generation. Grounded on the
// original source's `chat_generation.py` / `conversation_generation.py` for
// the exact placeholder-lifecycle and profile side-effect sequencing.

use std::sync::Arc;

use tracing::warn;

use crate::agent::{ConversationContext, LanguageAgent};
use crate::config::agent::AgentMode;
use crate::config::CONFIG;
use crate::domain::{Chat, Generation, GenerationUsage, HistoryMessage, ProfileData, User};
use crate::error::{AppError, AppResult};
use crate::store::Store;
use crate::transport::{CallbackToken, ChatTransport, InlineKeyboard, KeyboardButton, SendOptions};

pub struct ChatGenerationRunner {
    store: Store,
    transport: Arc<dyn ChatTransport>,
    agent: Arc<dyn LanguageAgent>,
}

impl ChatGenerationRunner {
    pub fn new(store: Store, transport: Arc<dyn ChatTransport>, agent: Arc<dyn LanguageAgent>) -> Self {
        Self { store, transport, agent }
    }

    pub async fn run(&self, generation: &Generation) -> AppResult<GenerationUsage> {
        let chat_id = generation.chat_id().ok_or_else(|| AppError::Invariant("chat generation with no chat id".into()))?;
        let chat = self
            .store
            .get_chat_by_id(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chat {}", chat_id)))?;
        let user = self.store.require_user(chat.user_id).await?;

        match self.run_inner(generation, &chat, &user).await {
            Ok(usage) => Ok(usage),
            Err(e) => {
                if let Err(send_err) =
                    self.transport.send_text(chat.user_id, "Something went wrong, please try again.", SendOptions::default()).await
                {
                    warn!("failed to notify {} of generation failure: {:#}", chat.user_id, send_err);
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, generation: &Generation, chat: &Chat, user: &User) -> AppResult<GenerationUsage> {
        // Step 1: transfer the placeholder, clearing it on the chat so a
        // second concurrent message does not reuse it.
        let placeholder_id = chat.status_message_id;
        self.store.set_generation_placeholder(generation.id, placeholder_id).await?;
        self.store.set_status_message_id(chat.id, None).await?;

        // Step 2: best-effort thinking indicator.
        if let Some(placeholder_id) = placeholder_id {
            if let Err(e) = self.transport.edit_text(chat.user_id, placeholder_id, "Thinking…", None).await {
                warn!("failed to edit placeholder for chat {}: {:#}", chat.id, e);
            }
        }
        if let Err(e) = self.transport.send_typing(chat.user_id).await {
            warn!("failed to send typing indicator for chat {}: {:#}", chat.id, e);
        }

        // Step 3: atomically consume the pending prompt.
        let prompt = self
            .store
            .take_user_prompt(chat.id)
            .await?
            .ok_or_else(|| AppError::Invariant(format!("generation {} dispatched with no pending prompt", generation.id)))?;

        // Step 4: invoke the agent in the configured mode.
        let context = match CONFIG.agent.mode {
            AgentMode::StatelessHistory => ConversationContext::History(chat.truncated_history(CONFIG.agent.history_window)),
            AgentMode::StatefulContinuation => ConversationContext::Continuation {
                token: chat.continuation_token.clone().unwrap_or_default(),
                history: chat.truncated_history(CONFIG.agent.history_window),
            },
        };
        let (response, usage) = self.agent.run_conversation(Some(&prompt), None, context).await?;

        // Step 5: apply the profile side-effect, if any. A conditional
        // re-embedding call is billed onto this same generation.
        let mut embedding_cost_usd = 0.0;
        if let Some(profile) = &response.profile {
            embedding_cost_usd = self.apply_profile_side_effect(chat.user_id, profile).await?;
        }

        // Step 6: placeholder lifecycle on completion.
        let refreshed = self
            .store
            .get_chat_by_id(chat.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chat {}", chat.id)))?;

        let delivered = if refreshed.user_prompt.is_some() {
            // A new message arrived mid-flight: edit the placeholder in
            // place so the user keeps typing, no notification sound.
            match placeholder_id {
                Some(id) => self.transport.edit_text(chat.user_id, id, &response.utterance, None).await.is_ok(),
                None => false,
            }
        } else if let Some(id) = placeholder_id {
            // Otherwise deliver as a fresh message with a push notification.
            self.transport.delete_message(chat.user_id, id).await.ok();
            false
        } else {
            false
        };

        if !delivered {
            if let Err(e) = self.transport.send_text(chat.user_id, &response.utterance, SendOptions::default()).await {
                warn!("failed to deliver reply for chat {}: {:#}", chat.id, e);
            }
        }

        // Step 7: append history and persist the continuation token.
        let assistant_content = serde_json::to_string(&response).map_err(|e| AppError::Invariant(e.to_string()))?;
        self.store
            .append_history(chat.id, HistoryMessage::User { content: prompt }, HistoryMessage::Assistant { content: assistant_content })
            .await?;
        if matches!(CONFIG.agent.mode, AgentMode::StatefulContinuation) {
            self.store.set_continuation_token(chat.id, usage.response_id.clone()).await?;
        }

        let _ = user;
        Ok(GenerationUsage {
            cached_input_tokens: Some(usage.cached_input_tokens),
            uncached_input_tokens: Some(usage.input_tokens - usage.cached_input_tokens),
            output_tokens: Some(usage.output_tokens),
            cost_usd: Some(usage.cost_usd + embedding_cost_usd),
            provider_response_id: usage.response_id,
        })
    }

    /// §4.F.i: validate, conditionally regenerate the embedding, persist,
    /// and present the profile card with an activate button. Returns the
    /// embedding call's cost in USD (zero when the summary didn't change).
    async fn apply_profile_side_effect(&self, telegram_id: i64, profile: &crate::agent::ProfileExtract) -> AppResult<f64> {
        let data = ProfileData {
            is_seeker: profile.is_seeker,
            is_provider: profile.is_provider,
            matching_summary: profile.matching_summary.clone(),
            practical_context: profile.practical_context.clone(),
            private_observations: profile.private_observations.clone(),
        };
        data.validate().map_err(AppError::Validation)?;

        let existing = self.store.require_user(telegram_id).await?;
        let summary_changed = existing.matching_summary.as_deref() != Some(data.matching_summary.as_str());
        let (new_embedding, embedding_cost_usd) = if summary_changed {
            let (embedding, cost_usd) = self.agent.embed(&data.matching_summary).await?;
            (Some(embedding), cost_usd)
        } else {
            (None, 0.0)
        };

        let updated = self
            .store
            .apply_profile_update(
                telegram_id,
                data.is_seeker,
                data.is_provider,
                data.matching_summary,
                data.practical_context,
                data.private_observations,
                new_embedding,
            )
            .await?;

        let card = format!("Here's your profile:\n\n{}", updated.display_profile());
        let keyboard = InlineKeyboard::single_row(vec![KeyboardButton {
            label: "Activate".to_string(),
            callback_token: CallbackToken::Activate { telegram_id },
        }]);
        self.transport
            .send_text(telegram_id, &card, SendOptions { reply_to: None, keyboard: Some(keyboard) })
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;
        Ok(embedding_cost_usd)
    }
}
