// src/config/server.rs
// Persistence and admin-surface configuration.

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_parsed_or, require_env};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: require_env("DATABASE_URL"),
            max_connections: env_parsed_or("SQLITE_MAX_CONNECTIONS", 5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
}

impl QdrantConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_or("QDRANT_URL", "http://localhost:6334"),
            collection: env_or("QDRANT_COLLECTION", "matchmaker_users"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub host: String,
    pub port: u16,
}

impl AdminConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("ADMIN_HOST", "0.0.0.0"),
            port: env_parsed_or("ADMIN_PORT", 8080),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env_or("RUST_LOG", "info"),
        }
    }
}
