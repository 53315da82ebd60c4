// src/transport/callback.rs
// Packed callback-query tokens (§6): `match:<action>:<match_id>`,
// `reset:<action>:<telegram_id>`, `activate:<telegram_id>`,
// `announcement:<action>:<source_message_id>`.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementAction {
    Send,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackToken {
    Match { action: MatchAction, match_id: i64 },
    Reset { action: ResetAction, telegram_id: i64 },
    Activate { telegram_id: i64 },
    Announcement { action: AnnouncementAction, source_message_id: i64 },
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackToken::Match { action, match_id } => {
                let a = match action {
                    MatchAction::Accept => "accept",
                    MatchAction::Reject => "reject",
                };
                write!(f, "match:{}:{}", a, match_id)
            }
            CallbackToken::Reset { action, telegram_id } => {
                let a = match action {
                    ResetAction::Confirm => "confirm",
                    ResetAction::Cancel => "cancel",
                };
                write!(f, "reset:{}:{}", a, telegram_id)
            }
            CallbackToken::Activate { telegram_id } => write!(f, "activate:{}", telegram_id),
            CallbackToken::Announcement { action, source_message_id } => {
                let a = match action {
                    AnnouncementAction::Send => "send",
                    AnnouncementAction::Cancel => "cancel",
                };
                write!(f, "announcement:{}:{}", a, source_message_id)
            }
        }
    }
}

impl FromStr for CallbackToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["match", action, id] => {
                let action = match *action {
                    "accept" => MatchAction::Accept,
                    "reject" => MatchAction::Reject,
                    other => return Err(format!("unknown match action: {}", other)),
                };
                let match_id = id.parse().map_err(|_| format!("invalid match id: {}", id))?;
                Ok(CallbackToken::Match { action, match_id })
            }
            ["reset", action, id] => {
                let action = match *action {
                    "confirm" => ResetAction::Confirm,
                    "cancel" => ResetAction::Cancel,
                    other => return Err(format!("unknown reset action: {}", other)),
                };
                let telegram_id = id.parse().map_err(|_| format!("invalid telegram id: {}", id))?;
                Ok(CallbackToken::Reset { action, telegram_id })
            }
            ["activate", id] => {
                let telegram_id = id.parse().map_err(|_| format!("invalid telegram id: {}", id))?;
                Ok(CallbackToken::Activate { telegram_id })
            }
            ["announcement", action, id] => {
                let action = match *action {
                    "send" => AnnouncementAction::Send,
                    "cancel" => AnnouncementAction::Cancel,
                    other => return Err(format!("unknown announcement action: {}", other)),
                };
                let source_message_id = id.parse().map_err(|_| format!("invalid message id: {}", id))?;
                Ok(CallbackToken::Announcement { action, source_message_id })
            }
            _ => Err(format!("unrecognized callback token: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_match_accept() {
        let token = CallbackToken::Match { action: MatchAction::Accept, match_id: 42 };
        assert_eq!(token.to_string(), "match:accept:42");
        assert_eq!(token.to_string().parse::<CallbackToken>().unwrap(), token);
    }

    #[test]
    fn roundtrips_reset_confirm() {
        let token = CallbackToken::Reset { action: ResetAction::Confirm, telegram_id: 1001 };
        assert_eq!(token.to_string(), "reset:confirm:1001");
        assert_eq!(token.to_string().parse::<CallbackToken>().unwrap(), token);
    }

    #[test]
    fn roundtrips_activate() {
        let token = CallbackToken::Activate { telegram_id: 7 };
        assert_eq!(token.to_string(), "activate:7");
        assert_eq!(token.to_string().parse::<CallbackToken>().unwrap(), token);
    }

    #[test]
    fn rejects_garbage() {
        assert!("nonsense".parse::<CallbackToken>().is_err());
        assert!("match:frobnicate:1".parse::<CallbackToken>().is_err());
    }
}
