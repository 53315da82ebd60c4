// src/store/mod.rs
// Persistence adapter (§4.A). Wraps a SQLite pool (system of record for every
// row) and a Qdrant collection (embedding similarity search), mirroring the
// teacher's pairing of `memory::storage::sqlite` with `memory::storage::qdrant`.

pub mod chats;
pub mod embeddings;
pub mod generations;
pub mod groups;
pub mod matches;
pub mod users;

use std::sync::Arc;

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::server::{DatabaseConfig, QdrantConfig};
use embeddings::EmbeddingStore;

#[derive(Clone)]
pub struct Store {
    pub(crate) db: SqlitePool,
    pub(crate) embeddings: Arc<EmbeddingStore>,
}

impl Store {
    pub async fn connect(db_config: &DatabaseConfig, qdrant_config: &QdrantConfig) -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(db_config.max_connections)
            .connect(&db_config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;

        let embeddings = Arc::new(EmbeddingStore::connect(qdrant_config).await?);

        Ok(Self { db, embeddings })
    }

    #[cfg(any(test, feature = "test-support"))]
    pub async fn connect_in_memory() -> Result<Self> {
        // A single connection: SQLite's `:memory:` is per-connection, so a
        // pool with >1 connection would see each query hit a different,
        // un-migrated database.
        let db = SqlitePoolOptions::new().max_connections(1).connect(":memory:").await?;
        sqlx::migrate!("./migrations").run(&db).await?;
        let embeddings = Arc::new(EmbeddingStore::fake_for_tests());
        Ok(Self { db, embeddings })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}
