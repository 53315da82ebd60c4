// src/domain/announcement.rs
// Broadcast entities — out of core scope beyond persistence and a status enum (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl AnnouncementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementStatus::Pending => "pending",
            AnnouncementStatus::Sending => "sending",
            AnnouncementStatus::Sent => "sent",
            AnnouncementStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "sending" => AnnouncementStatus::Sending,
            "sent" => AnnouncementStatus::Sent,
            "failed" => AnnouncementStatus::Failed,
            _ => AnnouncementStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub source_message_id: i64,
    pub text: String,
    pub status: AnnouncementStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: i64,
    pub name: String,
    pub filter_json: String,
    pub created_at: DateTime<Utc>,
}
