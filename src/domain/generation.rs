// src/domain/generation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Started,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Started => "started",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "started" => GenerationStatus::Started,
            "completed" => GenerationStatus::Completed,
            "failed" => GenerationStatus::Failed,
            _ => GenerationStatus::Pending,
        }
    }
}

/// Exactly one of chat id / match id is set (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskRef {
    Chat(i64),
    Match(i64),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationUsage {
    pub cached_input_tokens: Option<i64>,
    pub uncached_input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cost_usd: Option<f64>,
    pub provider_response_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: i64,
    pub task_ref: TaskRef,
    pub scheduled_for: DateTime<Utc>,
    pub status: GenerationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub usage: GenerationUsage,
    pub placeholder_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn chat_id(&self) -> Option<i64> {
        match self.task_ref {
            TaskRef::Chat(id) => Some(id),
            TaskRef::Match(_) => None,
        }
    }

    pub fn match_id(&self) -> Option<i64> {
        match self.task_ref {
            TaskRef::Match(id) => Some(id),
            TaskRef::Chat(_) => None,
        }
    }
}
