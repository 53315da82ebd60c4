// src/store/groups.rs
// Announcement / UserGroup / UserGroupMember persistence — out of core scope
// beyond insert/list (§3), kept as plain CRUD.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::{Announcement, AnnouncementStatus, UserGroup};
use crate::store::Store;

impl Store {
    pub async fn create_announcement(&self, source_message_id: i64, text: &str) -> Result<Announcement> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO announcements (source_message_id, text, status, created_at) VALUES (?, ?, 'pending', ?)",
        )
        .bind(source_message_id)
        .bind(text)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get_announcement(source_message_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to create announcement {}", source_message_id))
    }

    pub async fn get_announcement(&self, source_message_id: i64) -> Result<Option<Announcement>> {
        let row = sqlx::query("SELECT * FROM announcements WHERE source_message_id = ?")
            .bind(source_message_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| Announcement {
            id: r.get("id"),
            source_message_id: r.get("source_message_id"),
            text: r.get("text"),
            status: AnnouncementStatus::from_str(r.get::<String, _>("status").as_str()),
            created_at: DateTime::from_timestamp(r.get::<i64, _>("created_at"), 0).unwrap_or_default(),
        }))
    }

    pub async fn set_announcement_status(&self, source_message_id: i64, status: AnnouncementStatus) -> Result<()> {
        sqlx::query("UPDATE announcements SET status = ? WHERE source_message_id = ?")
            .bind(status.as_str())
            .bind(source_message_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn create_user_group(&self, name: &str, filter_json: &str) -> Result<UserGroup> {
        let now = Utc::now().timestamp();
        let id = sqlx::query("INSERT INTO user_groups (name, filter_json, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(filter_json)
            .bind(now)
            .execute(&self.db)
            .await?
            .last_insert_rowid();

        let row = sqlx::query("SELECT * FROM user_groups WHERE id = ?")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(UserGroup {
            id: row.get("id"),
            name: row.get("name"),
            filter_json: row.get("filter_json"),
            created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0).unwrap_or_default(),
        })
    }

    pub async fn add_user_group_member(&self, group_id: i64, telegram_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_group_members (group_id, telegram_id) VALUES (?, ?)
             ON CONFLICT(group_id, telegram_id) DO NOTHING",
        )
        .bind(group_id)
        .bind(telegram_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn list_user_group_members(&self, group_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT telegram_id FROM user_group_members WHERE group_id = ?")
            .bind(group_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("telegram_id")).collect())
    }
}
