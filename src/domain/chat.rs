// src/domain/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One turn in a chat's history. Tagged explicitly (§9 design note: "do not
/// rely on structural typing") so a future fallback history reproduces
/// structured assistant output faithfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum HistoryMessage {
    User { content: String },
    Assistant { content: String },
    System { content: String },
}

impl HistoryMessage {
    pub fn content(&self) -> &str {
        match self {
            HistoryMessage::User { content }
            | HistoryMessage::Assistant { content }
            | HistoryMessage::System { content } => content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub user_id: i64,
    pub message_history: Vec<HistoryMessage>,
    pub user_prompt: Option<String>,
    pub continuation_token: Option<String>,
    pub status_message_id: Option<i64>,
    pub admin_thread_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Truncate history to the last N messages, prepending a plain-text
    /// notice when anything was dropped (§4.D).
    pub fn truncated_history(&self, window: usize) -> Vec<HistoryMessage> {
        if self.message_history.len() <= window {
            return self.message_history.clone();
        }
        let mut out = Vec::with_capacity(window + 1);
        out.push(HistoryMessage::System {
            content: "earlier messages truncated".to_string(),
        });
        let start = self.message_history.len() - window;
        out.extend(self.message_history[start..].iter().cloned());
        out
    }
}
