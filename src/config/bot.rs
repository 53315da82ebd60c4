// src/config/bot.rs
// Chat transport configuration.

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, require_env, require_env_parsed};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub token: String,
    pub admin_group_id: i64,
    pub locale: String,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self {
            token: require_env("TELEGRAM_BOT_TOKEN"),
            admin_group_id: require_env_parsed("ADMIN_GROUP_ID"),
            locale: env_or("LOCALE", "en"),
        }
    }
}
