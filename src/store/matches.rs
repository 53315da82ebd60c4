// src/store/matches.rs
// Match / participation-record persistence (§3, §4.A, §4.G). One table
// covers both the paired and participation-only cases, per the §9 design
// note ("do not split into two tables").

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::{Match, MatchStatus};
use crate::store::Store;

fn row_to_match(row: &sqlx::sqlite::SqliteRow) -> Match {
    Match {
        id: row.get("id"),
        user_a_id: row.get("user_a_id"),
        user_b_id: row.get("user_b_id"),
        similarity_score: row.get("similarity_score"),
        match_rationale: row.get("match_rationale"),
        matching_round: row.get("matching_round"),
        status: MatchStatus::from_str(row.get::<String, _>("status").as_str()),
        latest_profile_updated_at: row
            .get::<Option<i64>, _>("latest_profile_updated_at")
            .map(|t| DateTime::from_timestamp(t, 0).unwrap_or_default()),
        created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0).unwrap_or_default(),
        updated_at: DateTime::from_timestamp(row.get::<i64, _>("updated_at"), 0).unwrap_or_default(),
    }
}

impl Store {
    pub async fn get_match(&self, id: i64) -> Result<Option<Match>> {
        let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(row_to_match))
    }

    pub async fn require_match(&self, id: i64) -> Result<Match> {
        self.get_match(id).await?.ok_or_else(|| anyhow::anyhow!("match {} not found", id))
    }

    /// Create a real pending match between two users (§4.G step 5).
    pub async fn create_match(
        &self,
        user_a_id: i64,
        user_b_id: i64,
        similarity_score: f32,
        matching_round: i64,
        latest_profile_updated_at: Option<DateTime<Utc>>,
    ) -> Result<Match> {
        let now = Utc::now().timestamp();
        let id = sqlx::query(
            "INSERT INTO matches (user_a_id, user_b_id, similarity_score, matching_round, status,
             latest_profile_updated_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(user_a_id)
        .bind(user_b_id)
        .bind(similarity_score)
        .bind(matching_round)
        .bind(latest_profile_updated_at.map(|t| t.timestamp()))
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();
        self.require_match(id).await
    }

    /// Create a participation record: "user tried this round, nothing to
    /// offer" (§4.G step 4).
    pub async fn create_participation_record(
        &self,
        user_a_id: i64,
        matching_round: i64,
        latest_profile_updated_at: Option<DateTime<Utc>>,
    ) -> Result<Match> {
        let now = Utc::now().timestamp();
        let id = sqlx::query(
            "INSERT INTO matches (user_a_id, user_b_id, matching_round, status, latest_profile_updated_at,
             created_at, updated_at)
             VALUES (?, NULL, ?, 'unmatched', ?, ?, ?)",
        )
        .bind(user_a_id)
        .bind(matching_round)
        .bind(latest_profile_updated_at.map(|t| t.timestamp()))
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();
        self.require_match(id).await
    }

    pub async fn set_match_rationale(&self, id: i64, rationale: &str) -> Result<()> {
        sqlx::query("UPDATE matches SET match_rationale = ?, updated_at = ? WHERE id = ?")
            .bind(rationale)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn set_match_status(&self, id: i64, status: MatchStatus) -> Result<()> {
        sqlx::query("UPDATE matches SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// The highest `matching_round` for which at least one participation
    /// record or match exists — used by the Matching Engine to decide
    /// whether to advance the round (§4.G step 2).
    pub async fn max_round_with_participants(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(matching_round), 0) as m FROM matches")
            .fetch_one(&self.db)
            .await?;
        Ok(row.get("m"))
    }

    /// Counterpart ids `user` must not be re-paired with, per the §4.A
    /// `match_exclusion_set` rule: any match not disqualified, or disqualified
    /// but with neither party having updated their profile since.
    pub async fn match_exclusion_set(&self, telegram_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT user_a_id, user_b_id, status, latest_profile_updated_at
             FROM matches WHERE (user_a_id = ? OR user_b_id = ?) AND user_b_id IS NOT NULL",
        )
        .bind(telegram_id)
        .bind(telegram_id)
        .fetch_all(&self.db)
        .await?;

        let mut exclusions = Vec::new();
        for row in rows {
            let user_a_id: i64 = row.get("user_a_id");
            let user_b_id: i64 = row.get("user_b_id");
            let status = MatchStatus::from_str(row.get::<String, _>("status").as_str());
            let counterpart = if user_a_id == telegram_id { user_b_id } else { user_a_id };

            if status != MatchStatus::Disqualified {
                exclusions.push(counterpart);
                continue;
            }

            // Disqualified: reconsider only if neither party has updated
            // their profile since the match was created.
            let latest_profile_updated_at: Option<i64> = row.get("latest_profile_updated_at");
            let a_updated = self.profile_updated_at(user_a_id).await?;
            let b_updated = self.profile_updated_at(user_b_id).await?;
            let either_updated = match latest_profile_updated_at {
                Some(baseline) => {
                    a_updated.map(|t| t.timestamp() > baseline).unwrap_or(false)
                        || b_updated.map(|t| t.timestamp() > baseline).unwrap_or(false)
                }
                None => false,
            };
            if !either_updated {
                exclusions.push(counterpart);
            }
        }
        Ok(exclusions)
    }

    async fn profile_updated_at(&self, telegram_id: i64) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT profile_updated_at FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.and_then(|r| r.get::<Option<i64>, _>("profile_updated_at"))
            .map(|t| DateTime::from_timestamp(t, 0).unwrap_or_default()))
    }
}
