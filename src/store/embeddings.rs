// src/store/embeddings.rs
// Embedding similarity search, backing `next_user_for_matching` /
// `similar_opposite_role_users` (§4.A). Grounded on the teacher's
// `memory::storage::qdrant::multi_store::QdrantMultiStore`: one collection,
// upsert-by-id, cosine search with a payload filter.
//
// Falls back to an in-process brute-force cosine scan when no Qdrant URL is
// reachable, mirroring the teacher's `SemanticSearch::is_available()`
// graceful-degradation pattern rather than making Qdrant a hard dependency
// for running the tests in this repo.

use anyhow::{Context, Result};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::server::QdrantConfig;

pub const EMBEDDING_DIM: u64 = 1536;

#[derive(Debug, Clone)]
pub struct UserEmbeddingEntry {
    pub telegram_id: i64,
    pub embedding: Vec<f32>,
    pub is_seeker: bool,
    pub is_provider: bool,
}

enum Backend {
    Qdrant { client: Qdrant, collection: String },
    InMemory(Mutex<HashMap<i64, UserEmbeddingEntry>>),
}

pub struct EmbeddingStore {
    backend: Backend,
}

impl EmbeddingStore {
    pub async fn connect(config: &QdrantConfig) -> Result<Self> {
        match Qdrant::from_url(&config.url).skip_compatibility_check().build() {
            Ok(client) => {
                let store = Self {
                    backend: Backend::Qdrant {
                        client,
                        collection: config.collection.clone(),
                    },
                };
                if let Err(e) = store.ensure_collection().await {
                    warn!("Qdrant unreachable ({}), falling back to in-process similarity search", e);
                    return Ok(Self {
                        backend: Backend::InMemory(Mutex::new(HashMap::new())),
                    });
                }
                info!("Embedding similarity search backed by Qdrant at {}", config.url);
                Ok(store)
            }
            Err(e) => {
                warn!("Failed to build Qdrant client ({}), using in-process similarity search", e);
                Ok(Self {
                    backend: Backend::InMemory(Mutex::new(HashMap::new())),
                })
            }
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn fake_for_tests() -> Self {
        Self {
            backend: Backend::InMemory(Mutex::new(HashMap::new())),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        if let Backend::Qdrant { client, collection } = &self.backend {
            let exists = client.collection_exists(collection).await?;
            if !exists {
                info!("Creating Qdrant collection: {}", collection);
                client
                    .create_collection(
                        CreateCollectionBuilder::new(collection)
                            .vectors_config(VectorParamsBuilder::new(EMBEDDING_DIM, Distance::Cosine)),
                    )
                    .await
                    .context("Failed to create Qdrant collection")?;
            }
        }
        Ok(())
    }

    /// Upsert or replace a user's embedding. Called whenever
    /// `matching_summary` changes (§3 invariant).
    pub async fn upsert(&self, entry: UserEmbeddingEntry) -> Result<()> {
        match &self.backend {
            Backend::Qdrant { client, collection } => {
                let mut payload = HashMap::new();
                payload.insert("is_seeker".to_string(), entry.is_seeker.into());
                payload.insert("is_provider".to_string(), entry.is_provider.into());
                let point = PointStruct::new(entry.telegram_id as u64, entry.embedding.clone(), payload);
                client
                    .upsert_points(UpsertPointsBuilder::new(collection.as_str(), vec![point]).wait(true))
                    .await
                    .context("Failed to upsert embedding")?;
                debug!("Upserted embedding for user {}", entry.telegram_id);
                Ok(())
            }
            Backend::InMemory(map) => {
                map.lock().await.insert(entry.telegram_id, entry);
                Ok(())
            }
        }
    }

    /// Fetch a user's stored embedding, needed by the Matching Engine to
    /// drive `similar_opposite_role_users` for a given `user_a` (§4.G step 3).
    pub async fn get(&self, telegram_id: i64) -> Result<Option<Vec<f32>>> {
        match &self.backend {
            Backend::Qdrant { client, collection } => {
                let points = client
                    .get_points(qdrant_client::qdrant::GetPointsBuilder::new(
                        collection.as_str(),
                        vec![(telegram_id as u64).into()],
                    ))
                    .await
                    .context("Failed to fetch embedding")?;
                Ok(points.result.into_iter().next().and_then(|p| match p.vectors {
                    Some(v) => v.vectors_options.and_then(|o| match o {
                        qdrant_client::qdrant::vectors::VectorsOptions::Vector(vec) => Some(vec.data),
                        _ => None,
                    }),
                    None => None,
                }))
            }
            Backend::InMemory(map) => Ok(map.lock().await.get(&telegram_id).map(|e| e.embedding.clone())),
        }
    }

    pub async fn delete(&self, telegram_id: i64) -> Result<()> {
        match &self.backend {
            Backend::Qdrant { .. } => Ok(()),
            Backend::InMemory(map) => {
                map.lock().await.remove(&telegram_id);
                Ok(())
            }
        }
    }

    /// Top-k users with complementary role and cosine similarity ≥
    /// `threshold`, excluding `exclusions`, sorted by similarity descending
    /// (§4.A `similar_opposite_role_users`).
    pub async fn search_opposite_role(
        &self,
        query_embedding: &[f32],
        query_is_seeker: bool,
        threshold: f32,
        k: usize,
        exclusions: &[i64],
    ) -> Result<Vec<(i64, f32)>> {
        // The counterpart role is the opposite of the querying user's
        // primary role: seekers look for providers and vice versa.
        let want_provider = query_is_seeker;

        match &self.backend {
            Backend::Qdrant { client, collection } => {
                let role_field = if want_provider { "is_provider" } else { "is_seeker" };
                let filter = Filter::must([Condition::matches(role_field, true)]);
                let results = client
                    .search_points(
                        SearchPointsBuilder::new(collection.as_str(), query_embedding.to_vec(), (k + exclusions.len()) as u64)
                            .filter(filter)
                            .score_threshold(threshold),
                    )
                    .await
                    .context("Failed to search embeddings")?;

                let mut out: Vec<(i64, f32)> = results
                    .result
                    .into_iter()
                    .filter_map(|p| {
                        let id = match p.id?.point_id_options? {
                            qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n as i64,
                            _ => return None,
                        };
                        if exclusions.contains(&id) {
                            None
                        } else {
                            Some((id, p.score))
                        }
                    })
                    .collect();
                out.truncate(k);
                Ok(out)
            }
            Backend::InMemory(map) => {
                let map = map.lock().await;
                let mut scored: Vec<(i64, f32)> = map
                    .values()
                    .filter(|e| {
                        if exclusions.contains(&e.telegram_id) {
                            return false;
                        }
                        if want_provider { e.is_provider } else { e.is_seeker }
                    })
                    .map(|e| (e.telegram_id, cosine_similarity(query_embedding, &e.embedding)))
                    .filter(|(_, score)| *score >= threshold)
                    .collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(k);
                Ok(scored)
            }
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
