// src/coalescer/mod.rs
// Message Coalescer (§4.F steps 1-3): buffers inbound text onto a chat and
// schedules or reuses a pending generation. Grounded on the original
// source's `chat_generation.py`, expressed with the Store/Scheduler/
// ChatTransport seams already established elsewhere in this crate.

pub mod chat_runner;

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::domain::GenerationStatus;
use crate::domain::TaskRef;
use crate::error::AppResult;
use crate::scheduler::{format_wait, Scheduler};
use crate::store::Store;
use crate::transport::{ChatTransport, SendOptions};

pub struct Coalescer {
    store: Store,
    scheduler: Arc<Scheduler>,
    transport: Arc<dyn ChatTransport>,
}

impl Coalescer {
    pub fn new(store: Store, scheduler: Arc<Scheduler>, transport: Arc<dyn ChatTransport>) -> Self {
        Self { store, scheduler, transport }
    }

    /// Handles one inbound text message (§4.F steps 1-3).
    pub async fn handle_inbound_text(&self, telegram_id: i64, text: &str) -> AppResult<()> {
        let chat = self.store.append_user_prompt(telegram_id, text).await?;
        let had_status_message = chat.status_message_id.is_some();

        let latest = self.store.latest_generation_for_chat(chat.id).await?;
        let generation = match latest {
            Some(g) if g.status == GenerationStatus::Pending => g,
            _ => self.scheduler.create_generation(TaskRef::Chat(chat.id)).await?,
        };

        // Scenario 2 (§8): a status message is never duplicated while one is
        // already showing for this chat.
        if had_status_message {
            return Ok(());
        }

        let wait = (generation.scheduled_for - Utc::now()).to_std().unwrap_or_default();
        let text = format!("Got it, I'll get back to you {}.", format_wait(wait));

        match self.transport.send_text(telegram_id, &text, SendOptions::default()).await {
            Ok(message_id) => {
                self.store.set_status_message_id(chat.id, Some(message_id)).await?;
            }
            Err(e) => warn!("failed to send status message to {}: {:#}", telegram_id, e),
        }

        Ok(())
    }
}
