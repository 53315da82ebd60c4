// src/domain/match_.rs
// Named `match_` because `match` is a keyword; re-exported as `Match`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Qualified,
    Disqualified,
    AAccepted,
    BAccepted,
    Connected,
    Rejected,
    Unmatched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Qualified => "qualified",
            MatchStatus::Disqualified => "disqualified",
            MatchStatus::AAccepted => "a_accepted",
            MatchStatus::BAccepted => "b_accepted",
            MatchStatus::Connected => "connected",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Unmatched => "unmatched",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "qualified" => MatchStatus::Qualified,
            "disqualified" => MatchStatus::Disqualified,
            "a_accepted" => MatchStatus::AAccepted,
            "b_accepted" => MatchStatus::BAccepted,
            "connected" => MatchStatus::Connected,
            "rejected" => MatchStatus::Rejected,
            "unmatched" => MatchStatus::Unmatched,
            _ => MatchStatus::Pending,
        }
    }

    /// Match still owes the user a consent response (used by
    /// `next_user_for_matching`'s pending-handshake exclusion, §4.A).
    pub fn is_pending_handshake(&self) -> bool {
        matches!(
            self,
            MatchStatus::Pending | MatchStatus::Qualified | MatchStatus::AAccepted | MatchStatus::BAccepted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub user_a_id: i64,
    pub user_b_id: Option<i64>,
    pub similarity_score: Option<f32>,
    pub match_rationale: Option<String>,
    pub matching_round: i64,
    pub status: MatchStatus,
    pub latest_profile_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn is_participation_record(&self) -> bool {
        self.user_b_id.is_none()
    }

    pub fn counterpart_of(&self, telegram_id: i64) -> Option<i64> {
        if self.user_a_id == telegram_id {
            self.user_b_id
        } else if self.user_b_id == Some(telegram_id) {
            Some(self.user_a_id)
        } else {
            None
        }
    }

    /// Apply an accept event from `telegram_id`, per the §4.H consent table.
    /// Returns `None` if the event is inapplicable to the current status.
    pub fn apply_accept(&self, telegram_id: i64) -> Option<MatchStatus> {
        let is_a = telegram_id == self.user_a_id;
        let is_b = self.user_b_id == Some(telegram_id);
        match self.status {
            MatchStatus::Pending | MatchStatus::Qualified => {
                if is_a {
                    Some(MatchStatus::AAccepted)
                } else if is_b {
                    Some(MatchStatus::BAccepted)
                } else {
                    None
                }
            }
            MatchStatus::AAccepted if is_b => Some(MatchStatus::Connected),
            MatchStatus::BAccepted if is_a => Some(MatchStatus::Connected),
            _ => None,
        }
    }

    pub fn apply_reject(&self, telegram_id: i64) -> Option<MatchStatus> {
        let is_party = telegram_id == self.user_a_id || self.user_b_id == Some(telegram_id);
        if is_party && self.status.is_pending_handshake() {
            Some(MatchStatus::Rejected)
        } else {
            None
        }
    }
}
