//! Storage trait definitions for AMA
//!
//! `MemoryStore` is the capability set the evaluator and adapter depend on:
//! search (read-only), rebuild-from-dialogue and correction-append (the only
//! mutations, both append-only), and persist. Implementations must serialise
//! mutations per user; different users never need coordination.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;
use std::str::FromStr;

use crate::error::{StorageError, StorageResult};
use crate::schema::{ArtifactRef, BuildReport, Correction, MemoryEntry};

/// Content digest (SHA-256 hex string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a search should rank entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Keyword,
    #[default]
    Vector,
    Hybrid,
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword => write!(f, "keyword"),
            Self::Vector => write!(f, "vector"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown search method: {other}")),
        }
    }
}

/// Session-derived memory for many users.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Up to `top_k` entries relevant to `query`, best first.
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        method: SearchMethod,
    ) -> StorageResult<Vec<MemoryEntry>>;

    /// Summarise `dialogue` and append the resulting entries.
    ///
    /// Summariser failures come back as `Ok` with `status = Error`; `Err` is
    /// reserved for storage failures.
    async fn rebuild_from_dialogue(&self, user_id: &str, dialogue: &str)
        -> StorageResult<BuildReport>;

    /// Append one correction entry per usable correction. Returns the
    /// number added.
    async fn append_corrections(
        &self,
        user_id: &str,
        corrections: &[Correction],
    ) -> StorageResult<usize>;

    /// Write the user's entries to `destination` as a JSON array.
    async fn persist(&self, user_id: &str, destination: &Path) -> StorageResult<ArtifactRef>;

    /// All entries for a user, in insertion order.
    async fn entries(&self, user_id: &str) -> StorageResult<Vec<MemoryEntry>>;

    /// Number of entries held for a user.
    async fn count(&self, user_id: &str) -> StorageResult<usize> {
        Ok(self.entries(user_id).await?.len())
    }
}

/// Reject ids that cannot safely be used as a file-name component.
pub fn validate_user_id(user_id: &str) -> StorageResult<()> {
    let trimmed = user_id.trim();
    if trimmed.is_empty()
        || trimmed != user_id
        || user_id.contains(['/', '\\'])
        || user_id.contains("..")
    {
        return Err(StorageError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_hex() {
        let d = ContentDigest::from_bytes(b"[]");
        assert_eq!(d.as_str().len(), 64);
        assert_eq!(d.short().len(), 12);
        assert_eq!(d, ContentDigest::from_bytes(b"[]"));
    }

    #[test]
    fn test_search_method_parse() {
        assert_eq!("Vector".parse::<SearchMethod>().unwrap(), SearchMethod::Vector);
        assert_eq!(" hybrid ".parse::<SearchMethod>().unwrap(), SearchMethod::Hybrid);
        assert!("fuzzy".parse::<SearchMethod>().is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("user_001").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("../etc").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id(" padded").is_err());
    }
}
