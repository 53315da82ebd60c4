// src/store/users.rs

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::{User, UserState};
use crate::store::embeddings::UserEmbeddingEntry;
use crate::store::Store;

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        telegram_id: row.get("telegram_id"),
        is_seeker: row.get("is_seeker"),
        is_provider: row.get("is_provider"),
        state: UserState::from_str(row.get::<String, _>("state").as_str()),
        matching_summary: row.get("matching_summary"),
        practical_context: row.get("practical_context"),
        private_observations: row.get("private_observations"),
        has_embedding: row.get("has_embedding"),
        profiler_version: row.get("profiler_version"),
        profile_updated_at: row
            .get::<Option<i64>, _>("profile_updated_at")
            .map(|t| DateTime::from_timestamp(t, 0).unwrap_or_default()),
        created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0).unwrap_or_default(),
        updated_at: DateTime::from_timestamp(row.get::<i64, _>("updated_at"), 0).unwrap_or_default(),
    }
}

impl Store {
    pub async fn get_or_create_user(&self, telegram_id: i64) -> Result<User> {
        if let Some(user) = self.get_user(telegram_id).await? {
            return Ok(user);
        }
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO users (telegram_id, state, created_at, updated_at) VALUES (?, 'onboarding', ?, ?)
             ON CONFLICT(telegram_id) DO NOTHING",
        )
        .bind(telegram_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get_user(telegram_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to create user {}", telegram_id))
    }

    pub async fn get_user(&self, telegram_id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn require_user(&self, telegram_id: i64) -> Result<User> {
        self.get_user(telegram_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} not found", telegram_id))
    }

    /// Apply the profile side-effect (§4.F.i): persist the new profile,
    /// regenerate the embedding iff `matching_summary` changed, and advance
    /// `state` to `ready` (creation) or `updated` (subsequent edits).
    pub async fn apply_profile_update(
        &self,
        telegram_id: i64,
        is_seeker: bool,
        is_provider: bool,
        matching_summary: String,
        practical_context: Option<String>,
        private_observations: Option<String>,
        new_embedding: Option<Vec<f32>>,
    ) -> Result<User> {
        let existing = self.require_user(telegram_id).await?;
        let now = Utc::now();
        let next_state = if existing.matching_summary.is_none() {
            UserState::Ready
        } else {
            UserState::Updated
        };

        let has_embedding = new_embedding.is_some() || existing.has_embedding;

        sqlx::query(
            "UPDATE users SET is_seeker = ?, is_provider = ?, matching_summary = ?,
             practical_context = ?, private_observations = ?, has_embedding = ?,
             profiler_version = ?, profile_updated_at = ?, state = ?, updated_at = ?
             WHERE telegram_id = ?",
        )
        .bind(is_seeker)
        .bind(is_provider)
        .bind(&matching_summary)
        .bind(&practical_context)
        .bind(&private_observations)
        .bind(has_embedding)
        .bind(crate::domain::CURRENT_PROFILER_VERSION)
        .bind(now.timestamp())
        .bind(next_state.as_str())
        .bind(now.timestamp())
        .bind(telegram_id)
        .execute(&self.db)
        .await?;

        if let Some(embedding) = new_embedding {
            self.embeddings
                .upsert(UserEmbeddingEntry {
                    telegram_id,
                    embedding,
                    is_seeker,
                    is_provider,
                })
                .await?;
        }

        self.require_user(telegram_id).await
    }

    /// Every currently-active user, for best-effort broadcast (§3 Announcement).
    pub async fn list_active_telegram_ids(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT telegram_id FROM users WHERE state = 'active'")
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("telegram_id")).collect())
    }

    pub async fn activate_user(&self, telegram_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET state = 'active', updated_at = ? WHERE telegram_id = ?")
            .bind(Utc::now().timestamp())
            .bind(telegram_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Reset a user back to onboarding, dropping the stored profile but
    /// keeping match history intact (§4.J).
    pub async fn reset_profile(&self, telegram_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET state = 'onboarding', is_seeker = NULL, is_provider = NULL,
             matching_summary = NULL, practical_context = NULL, private_observations = NULL,
             has_embedding = 0, updated_at = ? WHERE telegram_id = ?",
        )
        .bind(Utc::now().timestamp())
        .bind(telegram_id)
        .execute(&self.db)
        .await?;
        self.embeddings.delete(telegram_id).await?;
        Ok(())
    }

    /// Oldest-`profile_updated_at` active user eligible to be `user_a` this
    /// round: not already `user_a` in the current round, and not blocked by
    /// a pending handshake (§4.A `next_user_for_matching`).
    pub async fn next_user_for_matching(&self, round: i64) -> Result<Option<User>> {
        let rows = sqlx::query(
            "SELECT * FROM users
             WHERE state = 'active' AND has_embedding = 1
               AND (is_seeker = 1 OR is_provider = 1)
               AND telegram_id NOT IN (
                   SELECT user_a_id FROM matches WHERE matching_round = ?
               )
             ORDER BY profile_updated_at ASC, telegram_id ASC",
        )
        .bind(round)
        .fetch_all(&self.db)
        .await?;

        for row in &rows {
            let user = row_to_user(row);
            if self.has_pending_handshake(user.telegram_id).await? {
                continue;
            }
            return Ok(Some(user));
        }
        Ok(None)
    }

    /// Top-k opposite-role candidates for `user`, cosine similarity ≥
    /// `threshold`, excluding `exclusions`, sorted by similarity descending
    /// (§4.A `similar_opposite_role_users`). Returns an empty list if `user`
    /// has no stored embedding.
    pub async fn similar_opposite_role_users(
        &self,
        user: &User,
        threshold: f32,
        k: usize,
        exclusions: &[i64],
    ) -> Result<Vec<(User, f32)>> {
        let Some(query_embedding) = self.embeddings.get(user.telegram_id).await? else {
            return Ok(Vec::new());
        };
        let query_is_seeker = user.is_seeker.unwrap_or(false);
        let scored = self
            .embeddings
            .search_opposite_role(&query_embedding, query_is_seeker, threshold, k, exclusions)
            .await?;

        let mut out = Vec::with_capacity(scored.len());
        for (telegram_id, score) in scored {
            if let Some(candidate) = self.get_user(telegram_id).await? {
                out.push((candidate, score));
            }
        }
        Ok(out)
    }

    async fn has_pending_handshake(&self, telegram_id: i64) -> Result<bool> {
        // A user "owes a response" when the match is pending/qualified (both
        // parties owe one), or when the other party has already accepted and
        // this user hasn't (a_accepted blocks user_b, b_accepted blocks user_a).
        let row = sqlx::query(
            "SELECT status FROM matches
             WHERE status IN ('pending', 'qualified')
               AND (user_a_id = ? OR user_b_id = ?)
             UNION ALL
             SELECT status FROM matches WHERE status = 'a_accepted' AND user_b_id = ?
             UNION ALL
             SELECT status FROM matches WHERE status = 'b_accepted' AND user_a_id = ?
             LIMIT 1",
        )
        .bind(telegram_id)
        .bind(telegram_id)
        .bind(telegram_id)
        .bind(telegram_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.is_some())
    }
}
