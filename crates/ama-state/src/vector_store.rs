//! Embedding-ranked search on top of [`JsonFileStore`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use ama_oracle::{cosine_similarity, Embedder};

use crate::error::StorageResult;
use crate::json_store::{keyword_score, keyword_search, JsonFileStore};
use crate::schema::{ArtifactRef, BuildReport, Correction, MemoryEntry};
use crate::storage_traits::{MemoryStore, SearchMethod};

/// Memory store that ranks `Vector` and `Hybrid` searches by embedding
/// similarity. Persistence and mutation are delegated to the inner store.
///
/// Entry embeddings are cached by `memory_id`; entries never change, so a
/// cached vector stays valid. If the embedder fails the search falls back to
/// keyword ranking.
pub struct VectorStore {
    inner: JsonFileStore,
    embedder: Arc<dyn Embedder>,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl VectorStore {
    pub fn new(inner: JsonFileStore, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            inner,
            embedder,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &JsonFileStore {
        &self.inner
    }

    /// Embed the query and any entries not yet cached. Returns the query vector.
    async fn embed(&self, entries: &[MemoryEntry], query: &str) -> StorageResult<Option<Vec<f32>>> {
        let missing: Vec<&MemoryEntry> = {
            let cached = self.vectors.read().await;
            entries
                .iter()
                .filter(|e| !cached.contains_key(&e.memory_id))
                .collect()
        };

        let mut texts = Vec::with_capacity(missing.len() + 1);
        texts.push(query.to_string());
        texts.extend(missing.iter().map(|e| e.content.clone()));

        let mut vectors = match self.embedder.embed(&texts).await {
            Ok(v) if v.len() == texts.len() => v.into_iter(),
            Ok(v) => {
                warn!(expected = texts.len(), got = v.len(), "embedder returned wrong count");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "embedding failed, falling back to keyword search");
                return Ok(None);
            }
        };

        let query_vec = vectors.next().unwrap_or_default();
        let mut cached = self.vectors.write().await;
        for (entry, vector) in missing.into_iter().zip(vectors) {
            cached.insert(entry.memory_id.clone(), vector);
        }
        debug!(cached = cached.len(), "embedding cache updated");
        Ok(Some(query_vec))
    }
}

#[async_trait]
impl MemoryStore for VectorStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        method: SearchMethod,
    ) -> StorageResult<Vec<MemoryEntry>> {
        if method == SearchMethod::Keyword {
            return self.inner.search(user_id, query, top_k, method).await;
        }
        let entries = self.inner.entries(user_id).await?;
        if entries.is_empty() || top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let Some(query_vec) = self.embed(&entries, query).await? else {
            return Ok(keyword_search(&entries, query, top_k));
        };

        let cached = self.vectors.read().await;
        let mut scored: Vec<(f64, &MemoryEntry)> = entries
            .iter()
            .map(|e| {
                let semantic = cached
                    .get(&e.memory_id)
                    .map(|v| f64::from(cosine_similarity(&query_vec, v)))
                    .unwrap_or(0.0);
                let score = match method {
                    SearchMethod::Hybrid => (semantic + keyword_score(&e.content, query)) / 2.0,
                    _ => semantic,
                };
                (score, e)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn rebuild_from_dialogue(
        &self,
        user_id: &str,
        dialogue: &str,
    ) -> StorageResult<BuildReport> {
        self.inner.rebuild_from_dialogue(user_id, dialogue).await
    }

    async fn append_corrections(
        &self,
        user_id: &str,
        corrections: &[Correction],
    ) -> StorageResult<usize> {
        self.inner.append_corrections(user_id, corrections).await
    }

    async fn persist(&self, user_id: &str, destination: &Path) -> StorageResult<ArtifactRef> {
        self.inner.persist(user_id, destination).await
    }

    async fn entries(&self, user_id: &str) -> StorageResult<Vec<MemoryEntry>> {
        self.inner.entries(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ama_oracle::fakes::{HashEmbedder, StaticSummarizer};

    fn store(embedder: HashEmbedder) -> VectorStore {
        let inner = JsonFileStore::in_memory(Arc::new(StaticSummarizer::new(
            "Trip",
            vec![
                "flight JAL 004 departs march 3",
                "hotel gracery shinjuku booked",
                "sushi dinner at tsukiji",
            ],
        )));
        VectorStore::new(inner, Arc::new(embedder))
    }

    #[tokio::test]
    async fn test_vector_search_ranks_by_similarity() {
        let store = store(HashEmbedder::default());
        store.rebuild_from_dialogue("u", "d").await.unwrap();

        let hits = store
            .search("u", "which hotel in shinjuku", 2, SearchMethod::Vector)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.contains("gracery"));
    }

    #[tokio::test]
    async fn test_embedder_failure_falls_back_to_keyword() {
        let store = store(HashEmbedder::failing());
        store.rebuild_from_dialogue("u", "d").await.unwrap();

        let hits = store
            .search("u", "sushi dinner", 5, SearchMethod::Hybrid)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("tsukiji"));
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = store(HashEmbedder::default());
        let hits = store
            .search("u", "anything", 5, SearchMethod::Vector)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
