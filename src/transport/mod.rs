// src/transport/mod.rs
// Chat transport adapter (§4.C, §6). Hides the concrete `teloxide` types
// behind a small trait so the Scheduler/Coalescer/Matching code never
// depends on a specific chat-bot SDK — mirrors the teacher's habit of
// hiding a concrete provider SDK behind `llm::provider::LlmProvider`.

pub mod callback;
pub mod telegram;

use async_trait::async_trait;

pub use callback::{AnnouncementAction, CallbackToken, MatchAction, ResetAction};

/// A single labeled inline-keyboard button carrying a packed callback token.
#[derive(Debug, Clone)]
pub struct KeyboardButton {
    pub label: String,
    pub callback_token: CallbackToken,
}

/// An inline keyboard as rows of buttons.
#[derive(Debug, Clone, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl InlineKeyboard {
    pub fn single_row(buttons: Vec<KeyboardButton>) -> Self {
        Self { rows: vec![buttons] }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub reply_to: Option<i64>,
    pub keyboard: Option<InlineKeyboard>,
}

/// An inbound update delivered by the transport (§6).
#[derive(Debug, Clone)]
pub enum Inbound {
    Text { telegram_id: i64, text: String },
    Callback { telegram_id: i64, callback_id: String, token: CallbackToken, message_id: Option<i64> },
}

/// Adapter over the external chat API (§4.C). Implementations funnel every
/// send through the caller's Rate Gates — this trait itself performs no
/// throttling.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, telegram_id: i64, text: &str, opts: SendOptions) -> anyhow::Result<i64>;

    async fn edit_text(
        &self,
        telegram_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> anyhow::Result<()>;

    async fn delete_message(&self, telegram_id: i64, message_id: i64) -> anyhow::Result<()>;

    async fn send_typing(&self, telegram_id: i64) -> anyhow::Result<()>;

    /// Create a forum/topic thread in the admin group, returning its thread id.
    async fn create_forum_topic(&self, group_id: i64, name: &str) -> anyhow::Result<i64>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> anyhow::Result<()>;
}
