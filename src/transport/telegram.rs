// src/transport/telegram.rs
// `teloxide`-backed `ChatTransport` implementation (§4.C), grounded on
// `hi-youichi-loom`'s `telegram-bot` workspace member, which pins the same
// `teloxide`/`teloxide-core` pair for this exact surface.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::rate_gates::RateGates;
use crate::transport::{ChatTransport, InlineKeyboard, SendOptions};

pub struct TelegramTransport {
    bot: Bot,
    gates: Arc<RateGates>,
}

impl TelegramTransport {
    pub fn new(token: String, gates: Arc<RateGates>) -> Self {
        Self { bot: Bot::new(token), gates }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    fn build_markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.callback_token.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        InlineKeyboardMarkup::new(rows)
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, telegram_id: i64, text: &str, opts: SendOptions) -> anyhow::Result<i64> {
        self.gates.acquire_chat_send(telegram_id).await;

        let mut request = self.bot.send_message(ChatId(telegram_id), text);
        if let Some(reply_to) = opts.reply_to {
            request = request.reply_to_message_id(MessageId(reply_to as i32));
        }
        if let Some(keyboard) = opts.keyboard {
            request = request.reply_markup(Self::build_markup(keyboard));
        }
        let message = request.await?;
        Ok(message.id.0 as i64)
    }

    async fn edit_text(
        &self,
        telegram_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> anyhow::Result<()> {
        self.gates.acquire_chat_send(telegram_id).await;

        let mut request = self.bot.edit_message_text(ChatId(telegram_id), MessageId(message_id as i32), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(Self::build_markup(keyboard));
        }
        request.await?;
        Ok(())
    }

    async fn delete_message(&self, telegram_id: i64, message_id: i64) -> anyhow::Result<()> {
        self.gates.acquire_chat_send(telegram_id).await;
        self.bot.delete_message(ChatId(telegram_id), MessageId(message_id as i32)).await?;
        Ok(())
    }

    async fn send_typing(&self, telegram_id: i64) -> anyhow::Result<()> {
        self.gates.acquire_chat_send(telegram_id).await;
        self.bot.send_chat_action(ChatId(telegram_id), ChatAction::Typing).await?;
        Ok(())
    }

    async fn create_forum_topic(&self, group_id: i64, name: &str) -> anyhow::Result<i64> {
        self.gates.acquire_admin_send().await;
        let topic = self.bot.create_forum_topic(ChatId(group_id), name, 0, "").await?;
        Ok(topic.thread_id.0.0 as i64)
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> anyhow::Result<()> {
        let mut request = self.bot.answer_callback_query(callback_id);
        if let Some(text) = text {
            request = request.text(text);
        }
        request = request.show_alert(show_alert);
        request.await?;
        Ok(())
    }
}
