// src/domain/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a user's profile (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Onboarding,
    Ready,
    Active,
    Updated,
    Paused,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Onboarding => "onboarding",
            UserState::Ready => "ready",
            UserState::Active => "active",
            UserState::Updated => "updated",
            UserState::Paused => "paused",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ready" => UserState::Ready,
            "active" => UserState::Active,
            "updated" => UserState::Updated,
            "paused" => UserState::Paused,
            _ => UserState::Onboarding,
        }
    }

    /// States in which `matching_summary`/`embedding` are required to be present.
    pub fn requires_profile(&self) -> bool {
        matches!(self, UserState::Ready | UserState::Active | UserState::Updated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub telegram_id: i64,
    pub is_seeker: Option<bool>,
    pub is_provider: Option<bool>,
    pub state: UserState,
    pub matching_summary: Option<String>,
    pub practical_context: Option<String>,
    pub private_observations: Option<String>,
    pub has_embedding: bool,
    pub profiler_version: i64,
    pub profile_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_any_role(&self) -> bool {
        self.is_seeker.unwrap_or(false) || self.is_provider.unwrap_or(false)
    }

    /// Display profile shown to a matched counterpart — never includes
    /// `private_observations` (§4.H).
    pub fn display_profile(&self) -> String {
        let mut parts = Vec::new();
        if let Some(summary) = &self.matching_summary {
            parts.push(summary.clone());
        }
        if let Some(context) = &self.practical_context {
            parts.push(context.clone());
        }
        parts.join("\n\n")
    }

    /// All three profile parts, including `private_observations` — feeds the
    /// rationale agent only (§4.H step 1), never sent to either user.
    pub fn full_profile_for_rationale(&self) -> String {
        let mut parts = vec![self.display_profile()];
        if let Some(observations) = &self.private_observations {
            parts.push(observations.clone());
        }
        parts.join("\n\n")
    }
}

/// Data extracted from a conversation turn and applied as a profile update (§4.F.i).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub is_seeker: bool,
    pub is_provider: bool,
    pub matching_summary: String,
    pub practical_context: Option<String>,
    pub private_observations: Option<String>,
}

impl ProfileData {
    pub fn validate(&self) -> Result<(), String> {
        if self.matching_summary.trim().is_empty() {
            return Err("matching_summary must be non-empty".to_string());
        }
        if !self.is_seeker && !self.is_provider {
            return Err("at least one of is_seeker/is_provider must be true".to_string());
        }
        Ok(())
    }
}

pub const CURRENT_PROFILER_VERSION: i64 = 1;
