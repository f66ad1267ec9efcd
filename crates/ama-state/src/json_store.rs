//! JSON-file backed memory store.
//!
//! Each user's entries live in `<storage_dir>/<user_id>_memories.json` and are
//! cached in memory after first access. Every mutation rewrites the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use ama_oracle::DialogueSummarizer;

use crate::artifact::{write_artifact, write_atomic};
use crate::error::StorageResult;
use crate::locks::UserLocks;
use crate::schema::{ArtifactRef, BuildReport, Correction, EntryMetadata, MemoryEntry, MemorySource};
use crate::storage_traits::{validate_user_id, MemoryStore, SearchMethod};

/// `<file>.corrupt-<id>` next to an unreadable memory file.
fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Lowercased query words longer than two characters, punctuation stripped.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// Keyword relevance of `content` to `query` in `[0, 1]`.
///
/// A content containing the whole query scores 1; otherwise the score is the
/// share of query terms found in it.
pub fn keyword_score(content: &str, query: &str) -> f64 {
    let content = content.to_lowercase();
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    if content.contains(&query) {
        return 1.0;
    }
    let terms = query_terms(&query);
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms.iter().filter(|t| content.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}

/// Rank entries by keyword score, best first; ties keep insertion order.
pub fn keyword_search(entries: &[MemoryEntry], query: &str, top_k: usize) -> Vec<MemoryEntry> {
    let mut scored: Vec<(f64, &MemoryEntry)> = entries
        .iter()
        .map(|e| (keyword_score(&e.content, query), e))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, e)| e.clone())
        .collect()
}

/// Memory store persisting one JSON file per user.
pub struct JsonFileStore {
    storage_dir: Option<PathBuf>,
    summarizer: Arc<dyn DialogueSummarizer>,
    cache: RwLock<HashMap<String, Vec<MemoryEntry>>>,
    locks: UserLocks,
}

impl JsonFileStore {
    /// Store rooted at `storage_dir`, created on first write.
    pub fn new(storage_dir: impl Into<PathBuf>, summarizer: Arc<dyn DialogueSummarizer>) -> Self {
        Self {
            storage_dir: Some(storage_dir.into()),
            summarizer,
            cache: RwLock::new(HashMap::new()),
            locks: UserLocks::new(),
        }
    }

    /// Store that never touches the file system (except through `persist`).
    pub fn in_memory(summarizer: Arc<dyn DialogueSummarizer>) -> Self {
        Self {
            storage_dir: None,
            summarizer,
            cache: RwLock::new(HashMap::new()),
            locks: UserLocks::new(),
        }
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    fn user_file(&self, user_id: &str) -> Option<PathBuf> {
        self.storage_dir
            .as_ref()
            .map(|dir| dir.join(format!("{user_id}_memories.json")))
    }

    async fn read_file(&self, user_id: &str) -> StorageResult<Vec<MemoryEntry>> {
        let Some(path) = self.user_file(user_id) else {
            return Ok(Vec::new());
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // Keep the unreadable file; the next write would replace it.
                let aside = quarantine_path(&path);
                tokio::fs::rename(&path, &aside).await?;
                warn!(
                    user_id,
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "unreadable memory file moved aside, starting empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Make sure the user's entries are in the cache.
    async fn ensure_loaded(&self, user_id: &str) -> StorageResult<()> {
        if self.cache.read().await.contains_key(user_id) {
            return Ok(());
        }
        let entries = self.read_file(user_id).await?;
        debug!(user_id, entries = entries.len(), "loaded memories");
        self.cache
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert(entries);
        Ok(())
    }

    /// Append entries and write the user's file. Caller holds the user lock.
    async fn append(&self, user_id: &str, new_entries: Vec<MemoryEntry>) -> StorageResult<usize> {
        let snapshot = {
            let mut cache = self.cache.write().await;
            let entries = cache.entry(user_id.to_string()).or_default();
            entries.extend(new_entries);
            entries.clone()
        };
        if let Some(path) = self.user_file(user_id) {
            write_atomic(&path, &serde_json::to_vec_pretty(&snapshot)?).await?;
        }
        Ok(snapshot.len())
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        method: SearchMethod,
    ) -> StorageResult<Vec<MemoryEntry>> {
        validate_user_id(user_id)?;
        if method != SearchMethod::Keyword {
            debug!(%method, "no embedder configured, using keyword search");
        }
        self.ensure_loaded(user_id).await?;
        let cache = self.cache.read().await;
        let entries = cache.get(user_id).map(Vec::as_slice).unwrap_or_default();
        Ok(keyword_search(entries, query, top_k))
    }

    async fn rebuild_from_dialogue(
        &self,
        user_id: &str,
        dialogue: &str,
    ) -> StorageResult<BuildReport> {
        validate_user_id(user_id)?;
        let _guard = self.locks.acquire(user_id).await;
        self.ensure_loaded(user_id).await?;

        let summary = match self.summarizer.summarize(dialogue).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(user_id, error = %e, "dialogue summarisation failed");
                let total = self.count(user_id).await?;
                return Ok(BuildReport::error(e.to_string(), total));
            }
        };

        let new_entries: Vec<MemoryEntry> = summary
            .memories
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| {
                let metadata = EntryMetadata::new(MemorySource::DialogueSummarization)
                    .with("summary", summary.summary.clone());
                let entry = MemoryEntry::new(user_id, m.content.trim(), metadata);
                match &m.timestamp {
                    Some(ts) if !ts.trim().is_empty() => entry.with_timestamp(ts.trim()),
                    _ => entry,
                }
            })
            .collect();

        let added = new_entries.len();
        let total = self.append(user_id, new_entries).await?;
        info!(user_id, added, total, "rebuilt memories from dialogue");
        Ok(BuildReport::built(summary.summary, added, total))
    }

    async fn append_corrections(
        &self,
        user_id: &str,
        corrections: &[Correction],
    ) -> StorageResult<usize> {
        validate_user_id(user_id)?;
        let _guard = self.locks.acquire(user_id).await;
        self.ensure_loaded(user_id).await?;

        let new_entries: Vec<MemoryEntry> = corrections
            .iter()
            .filter(|c| {
                let usable = c.is_usable();
                if !usable {
                    debug!(question = %c.question, "skipping unusable correction");
                }
                usable
            })
            .map(|c| MemoryEntry::correction(user_id, c))
            .collect();

        let added = new_entries.len();
        if added > 0 {
            self.append(user_id, new_entries).await?;
        }
        info!(user_id, added, "appended corrections");
        Ok(added)
    }

    async fn persist(&self, user_id: &str, destination: &Path) -> StorageResult<ArtifactRef> {
        validate_user_id(user_id)?;
        let entries = self.entries(user_id).await?;
        let artifact = write_artifact(destination, &entries).await?;
        info!(
            user_id,
            path = %artifact.path.display(),
            entries = artifact.entries,
            "persisted memory artifact"
        );
        Ok(artifact)
    }

    async fn entries(&self, user_id: &str) -> StorageResult<Vec<MemoryEntry>> {
        validate_user_id(user_id)?;
        self.ensure_loaded(user_id).await?;
        Ok(self
            .cache
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
