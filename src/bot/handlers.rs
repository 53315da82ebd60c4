// src/bot/handlers.rs
// Inbound routing (§6, SPEC_FULL §4.I): text goes to the Coalescer, callback
// tokens fan out to the consent state machine, profile activation, reset
// confirmation, and the announcement broadcast. Deliberately thin — per the
// spec's own framing, this is glue, not bespoke engineering.

use std::sync::Arc;

use teloxide::prelude::*;
use tokio::sync::Notify;
use tracing::warn;

use crate::bot::keyboards;
use crate::coalescer::Coalescer;
use crate::domain::AnnouncementStatus;
use crate::rationale::MatchRationaleRunner;
use crate::store::Store;
use crate::transport::{AnnouncementAction, CallbackToken, ChatTransport, MatchAction, ResetAction, SendOptions};

pub struct BotState {
    pub store: Store,
    pub transport: Arc<dyn ChatTransport>,
    pub coalescer: Arc<Coalescer>,
    pub rationale: Arc<MatchRationaleRunner>,
    pub matching_nudge: Arc<Notify>,
}

pub async fn on_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let telegram_id = msg.chat.id.0;
    let Some(text) = msg.text() else { return Ok(()) };

    match text.trim() {
        "/start" => {
            if let Err(e) = state.store.get_or_create_user(telegram_id).await {
                warn!("failed to create user {}: {:#}", telegram_id, e);
                return Ok(());
            }
            let greeting = "Hi! Tell me a bit about your work and what you're looking for, and I'll build your profile.";
            if let Err(e) = state.transport.send_text(telegram_id, greeting, SendOptions::default()).await {
                warn!("failed to greet {}: {:#}", telegram_id, e);
            }
        }
        "/reset" => {
            let keyboard = keyboards::reset_confirmation(telegram_id);
            let prompt = "This clears your profile and conversation history, but keeps your match history. Are you sure?";
            if let Err(e) = state
                .transport
                .send_text(telegram_id, prompt, SendOptions { reply_to: None, keyboard: Some(keyboard) })
                .await
            {
                warn!("failed to send reset confirmation to {}: {:#}", telegram_id, e);
            }
        }
        _ => {
            if let Err(e) = state.coalescer.handle_inbound_text(telegram_id, text).await {
                warn!("failed to handle message from {}: {:#}", telegram_id, e);
            }
        }
    }

    Ok(())
}

pub async fn on_callback(q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let telegram_id = q.from.id.0 as i64;
    if let Some(data) = q.data.as_deref() {
        match data.parse::<CallbackToken>() {
            Ok(CallbackToken::Match { action, match_id }) => {
                let accept = matches!(action, MatchAction::Accept);
                if let Err(e) = state.rationale.handle_consent(match_id, telegram_id, accept).await {
                    warn!("failed to apply consent for match {}: {:#}", match_id, e);
                }
            }
            Ok(CallbackToken::Reset { action, telegram_id: target }) => match action {
                ResetAction::Confirm => handle_reset_confirm(&state, target).await,
                ResetAction::Cancel => {
                    send_best_effort(&state, target, "Reset cancelled, nothing changed.").await;
                }
            },
            Ok(CallbackToken::Activate { telegram_id: target }) => {
                if let Err(e) = state.store.activate_user(target).await {
                    warn!("failed to activate user {}: {:#}", target, e);
                } else {
                    state.matching_nudge.notify_one();
                    send_best_effort(&state, target, "You're active! I'll reach out once I find a good match.").await;
                }
            }
            Ok(CallbackToken::Announcement { action, source_message_id }) => {
                handle_announcement(&state, action, source_message_id).await;
            }
            Err(e) => warn!("unrecognized callback data {:?}: {}", data, e),
        }
    }

    if let Err(e) = state.transport.answer_callback(&q.id, None, false).await {
        warn!("failed to answer callback {}: {:#}", q.id, e);
    }
    Ok(())
}

async fn handle_reset_confirm(state: &BotState, telegram_id: i64) {
    if let Err(e) = state.store.reset_profile(telegram_id).await {
        warn!("failed to reset profile for {}: {:#}", telegram_id, e);
        return;
    }
    if let Err(e) = state.store.reset_chat(telegram_id).await {
        warn!("failed to reset chat for {}: {:#}", telegram_id, e);
    }
    send_best_effort(state, telegram_id, "Done — your profile has been reset. Tell me about yourself whenever you're ready.").await;
}

/// Thin broadcast loop — announcements are out of core scope beyond
/// persistence and a status enum (§3).
async fn handle_announcement(state: &BotState, action: AnnouncementAction, source_message_id: i64) {
    let Ok(Some(announcement)) = state.store.get_announcement(source_message_id).await else {
        return;
    };
    if announcement.status != AnnouncementStatus::Pending {
        return;
    }

    match action {
        AnnouncementAction::Cancel => {
            if let Err(e) = state.store.set_announcement_status(source_message_id, AnnouncementStatus::Failed).await {
                warn!("failed to mark announcement {} cancelled: {:#}", source_message_id, e);
            }
        }
        AnnouncementAction::Send => {
            if let Err(e) = state.store.set_announcement_status(source_message_id, AnnouncementStatus::Sending).await {
                warn!("failed to mark announcement {} sending: {:#}", source_message_id, e);
                return;
            }
            let recipients = state.store.list_active_telegram_ids().await.unwrap_or_default();
            for telegram_id in recipients {
                if let Err(e) = state.transport.send_text(telegram_id, &announcement.text, SendOptions::default()).await {
                    warn!("failed to deliver announcement {} to {}: {:#}", source_message_id, telegram_id, e);
                }
            }
            if let Err(e) = state.store.set_announcement_status(source_message_id, AnnouncementStatus::Sent).await {
                warn!("failed to mark announcement {} sent: {:#}", source_message_id, e);
            }
        }
    }
}

async fn send_best_effort(state: &BotState, telegram_id: i64, text: &str) {
    if let Err(e) = state.transport.send_text(telegram_id, text, SendOptions::default()).await {
        warn!("failed to message {}: {:#}", telegram_id, e);
    }
}
