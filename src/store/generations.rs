// src/store/generations.rs
// Generation queue persistence (§4.A, §4.E). Ordering and selection queries
// mirror the teacher's `budget_tracking` row shape (token counters + cost
// computed by the caller, persisted verbatim) combined with the original
// source's `jobs/generation.py` sequential-queue queries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::{Generation, GenerationStatus, GenerationUsage, TaskRef};
use crate::store::Store;

fn row_to_generation(row: &sqlx::sqlite::SqliteRow) -> Generation {
    let chat_id: Option<i64> = row.get("chat_id");
    let match_id: Option<i64> = row.get("match_id");
    // §3 invariant: exactly one of chat id / match id is set.
    let task_ref = match (chat_id, match_id) {
        (Some(c), None) => TaskRef::Chat(c),
        (None, Some(m)) => TaskRef::Match(m),
        other => panic!("generation {:?} has invalid task_ref {:?}", row.get::<i64, _>("id"), other),
    };
    Generation {
        id: row.get("id"),
        task_ref,
        scheduled_for: DateTime::from_timestamp(row.get::<i64, _>("scheduled_for"), 0).unwrap_or_default(),
        status: GenerationStatus::from_str(row.get::<String, _>("status").as_str()),
        started_at: row
            .get::<Option<i64>, _>("started_at")
            .map(|t| DateTime::from_timestamp(t, 0).unwrap_or_default()),
        usage: GenerationUsage {
            cached_input_tokens: row.get("cached_input_tokens"),
            uncached_input_tokens: row.get("uncached_input_tokens"),
            output_tokens: row.get("output_tokens"),
            cost_usd: row.get("cost_usd"),
            provider_response_id: row.get("provider_response_id"),
        },
        placeholder_message_id: row.get("placeholder_message_id"),
        created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0).unwrap_or_default(),
    }
}

impl Store {
    pub async fn get_generation(&self, id: i64) -> Result<Option<Generation>> {
        let row = sqlx::query("SELECT * FROM generations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(row_to_generation))
    }

    pub async fn require_generation(&self, id: i64) -> Result<Generation> {
        self.get_generation(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("generation {} not found", id))
    }

    /// Earliest-`scheduled_for ≤ now`, `status = pending` generation, ties
    /// broken by id (§4.A `next_pending_generation`).
    pub async fn next_pending_generation(&self, now: DateTime<Utc>) -> Result<Option<Generation>> {
        let row = sqlx::query(
            "SELECT * FROM generations WHERE status = 'pending' AND scheduled_for <= ?
             ORDER BY scheduled_for ASC, id ASC LIMIT 1",
        )
        .bind(now.timestamp())
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_generation))
    }

    /// Earliest future `scheduled_for` among pending generations, for sleep
    /// calculation (§4.A `min_pending_scheduled_for`).
    pub async fn min_pending_scheduled_for(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MIN(scheduled_for) as m FROM generations WHERE status = 'pending'")
            .fetch_one(&self.db)
            .await?;
        Ok(row
            .get::<Option<i64>, _>("m")
            .map(|t| DateTime::from_timestamp(t, 0).unwrap_or_default()))
    }

    /// Used when enqueueing, so queue order is preserved (§4.A `max_scheduled_for`).
    pub async fn max_scheduled_for(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MAX(scheduled_for) as m FROM generations")
            .fetch_one(&self.db)
            .await?;
        Ok(row
            .get::<Option<i64>, _>("m")
            .map(|t| DateTime::from_timestamp(t, 0).unwrap_or_default()))
    }

    /// Most recently *started* generation with a non-null cost, used for
    /// budget pacing (§4.A `last_cost_generation`).
    pub async fn last_cost_generation(&self) -> Result<Option<Generation>> {
        let row = sqlx::query(
            "SELECT * FROM generations WHERE started_at IS NOT NULL AND cost_usd IS NOT NULL
             ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_generation))
    }

    /// The chat's most recent generation regardless of status, used by the
    /// Coalescer to decide whether to reuse a still-pending row (§4.F step 2).
    pub async fn latest_generation_for_chat(&self, chat_id: i64) -> Result<Option<Generation>> {
        let row = sqlx::query("SELECT * FROM generations WHERE chat_id = ? ORDER BY id DESC LIMIT 1")
            .bind(chat_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(row_to_generation))
    }

    pub async fn insert_generation(&self, task_ref: TaskRef, scheduled_for: DateTime<Utc>) -> Result<Generation> {
        let now = Utc::now().timestamp();
        let (chat_id, match_id) = match task_ref {
            TaskRef::Chat(id) => (Some(id), None),
            TaskRef::Match(id) => (None, Some(id)),
        };
        let id = sqlx::query(
            "INSERT INTO generations (chat_id, match_id, scheduled_for, status, created_at)
             VALUES (?, ?, ?, 'pending', ?)",
        )
        .bind(chat_id)
        .bind(match_id)
        .bind(scheduled_for.timestamp())
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        self.require_generation(id).await
    }

    /// `pending → started`; sets `started_at` (§3 invariant).
    pub async fn start_generation(&self, id: i64) -> Result<Generation> {
        sqlx::query("UPDATE generations SET status = 'started', started_at = ? WHERE id = ? AND status = 'pending'")
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.db)
            .await?;
        self.require_generation(id).await
    }

    /// `started → completed`, persisting usage/cost/response id (§4.E).
    pub async fn complete_generation(&self, id: i64, usage: &GenerationUsage) -> Result<()> {
        sqlx::query(
            "UPDATE generations SET status = 'completed', completed_at = ?,
             cached_input_tokens = ?, uncached_input_tokens = ?, output_tokens = ?,
             cost_usd = ?, provider_response_id = ? WHERE id = ?",
        )
        .bind(Utc::now().timestamp())
        .bind(usage.cached_input_tokens)
        .bind(usage.uncached_input_tokens)
        .bind(usage.output_tokens)
        .bind(usage.cost_usd)
        .bind(&usage.provider_response_id)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// `started → failed` (§4.E failure policy).
    pub async fn fail_generation(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE generations SET status = 'failed' WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn set_generation_placeholder(&self, id: i64, placeholder_message_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE generations SET placeholder_message_id = ? WHERE id = ?")
            .bind(placeholder_message_id)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
