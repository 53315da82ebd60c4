// src/config/mod.rs
// Central configuration for the matchmaking service.

pub mod agent;
pub mod bot;
pub mod budget;
pub mod helpers;
pub mod matching;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: MatchmakerConfig = MatchmakerConfig::from_env();
}

/// Top-level configuration, composed of small domain sub-configs — the
/// server process reads this once at startup and treats it as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakerConfig {
    pub bot: bot::BotConfig,
    pub agent: agent::AgentConfig,
    pub budget: budget::BudgetConfig,
    pub matching: matching::MatchingConfig,
    pub database: server::DatabaseConfig,
    pub qdrant: server::QdrantConfig,
    pub admin: server::AdminConfig,
    pub logging: server::LoggingConfig,
}

impl MatchmakerConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            bot: bot::BotConfig::from_env(),
            agent: agent::AgentConfig::from_env(),
            budget: budget::BudgetConfig::from_env(),
            matching: matching::MatchingConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            qdrant: server::QdrantConfig::from_env(),
            admin: server::AdminConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
        }
    }
}
