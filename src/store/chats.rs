// src/store/chats.rs

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::{Chat, HistoryMessage};
use crate::store::Store;

fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> Chat {
    let history_json: String = row.get("message_history");
    Chat {
        id: row.get("id"),
        user_id: row.get("user_id"),
        message_history: serde_json::from_str(&history_json).unwrap_or_default(),
        user_prompt: row.get("user_prompt"),
        continuation_token: row.get("continuation_token"),
        status_message_id: row.get("status_message_id"),
        admin_thread_id: row.get("admin_thread_id"),
        created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0).unwrap_or_default(),
        updated_at: DateTime::from_timestamp(row.get::<i64, _>("updated_at"), 0).unwrap_or_default(),
    }
}

impl Store {
    pub async fn get_or_create_chat(&self, user_id: i64) -> Result<Chat> {
        if let Some(chat) = self.get_chat(user_id).await? {
            return Ok(chat);
        }
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO chats (user_id, message_history, created_at, updated_at)
             VALUES (?, '[]', ?, ?) ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get_chat(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to create chat for user {}", user_id))
    }

    pub async fn get_chat(&self, user_id: i64) -> Result<Option<Chat>> {
        let row = sqlx::query("SELECT * FROM chats WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(row_to_chat))
    }

    pub async fn get_chat_by_id(&self, chat_id: i64) -> Result<Option<Chat>> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(row_to_chat))
    }

    /// Append inbound text to the pending prompt (§4.F step 1).
    pub async fn append_user_prompt(&self, user_id: i64, incoming: &str) -> Result<Chat> {
        let chat = self.get_or_create_chat(user_id).await?;
        let combined = match &chat.user_prompt {
            Some(existing) => format!("{}\n\n{}", existing, incoming),
            None => incoming.to_string(),
        };
        sqlx::query("UPDATE chats SET user_prompt = ?, updated_at = ? WHERE id = ?")
            .bind(&combined)
            .bind(Utc::now().timestamp())
            .bind(chat.id)
            .execute(&self.db)
            .await?;
        self.get_chat_by_id(chat.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("chat {} vanished", chat.id))
    }

    /// Atomically consume the pending prompt, returning it (§4.F step 3).
    pub async fn take_user_prompt(&self, chat_id: i64) -> Result<Option<String>> {
        let mut tx = self.db.begin().await?;
        let row = sqlx::query("SELECT user_prompt FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?;
        let prompt: Option<String> = row.and_then(|r| r.get("user_prompt"));
        sqlx::query("UPDATE chats SET user_prompt = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(prompt)
    }

    pub async fn set_status_message_id(&self, chat_id: i64, message_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE chats SET status_message_id = ?, updated_at = ? WHERE id = ?")
            .bind(message_id)
            .bind(Utc::now().timestamp())
            .bind(chat_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn set_continuation_token(&self, chat_id: i64, token: Option<String>) -> Result<()> {
        sqlx::query("UPDATE chats SET continuation_token = ?, updated_at = ? WHERE id = ?")
            .bind(token)
            .bind(Utc::now().timestamp())
            .bind(chat_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Clears history, pending prompt, and continuation token on reset
    /// (§4.J) — match history on `matches` is untouched.
    pub async fn reset_chat(&self, user_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE chats SET message_history = '[]', user_prompt = NULL, continuation_token = NULL,
             status_message_id = NULL, updated_at = ? WHERE user_id = ?",
        )
        .bind(Utc::now().timestamp())
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn append_history(
        &self,
        chat_id: i64,
        user_message: HistoryMessage,
        assistant_message: HistoryMessage,
    ) -> Result<()> {
        let chat = self
            .get_chat_by_id(chat_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("chat {} not found", chat_id))?;
        let mut history = chat.message_history;
        history.push(user_message);
        history.push(assistant_message);
        let json = serde_json::to_string(&history)?;
        sqlx::query("UPDATE chats SET message_history = ?, updated_at = ? WHERE id = ?")
            .bind(json)
            .bind(Utc::now().timestamp())
            .bind(chat_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
