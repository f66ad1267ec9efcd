//! Memory artifact files: `<name>.json` plus a `<name>.json.digest` sidecar.

use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};
use crate::schema::{ArtifactRef, MemoryEntry};
use crate::storage_traits::ContentDigest;

/// Path of the digest sidecar for an artifact.
pub fn digest_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".digest");
    PathBuf::from(name)
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so readers never observe a half-written file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Persist entries as pretty JSON with a digest sidecar.
pub async fn write_artifact(path: &Path, entries: &[MemoryEntry]) -> StorageResult<ArtifactRef> {
    let json = serde_json::to_vec_pretty(entries)?;
    let digest = ContentDigest::from_bytes(&json);

    write_atomic(path, &json).await?;
    write_atomic(&digest_path(path), digest.as_str().as_bytes()).await?;

    Ok(ArtifactRef {
        path: path.to_path_buf(),
        digest: digest.as_str().to_string(),
        entries: entries.len(),
    })
}

/// Read an artifact and verify it against its digest sidecar.
pub async fn read_artifact(path: &Path) -> StorageResult<Vec<MemoryEntry>> {
    let json = tokio::fs::read(path).await?;
    let expected = tokio::fs::read_to_string(digest_path(path)).await?;
    let actual = ContentDigest::from_bytes(&json);
    if expected.trim() != actual.as_str() {
        return Err(StorageError::DigestMismatch {
            path: path.display().to_string(),
            expected: expected.trim().to_string(),
            actual: actual.as_str().to_string(),
        });
    }
    Ok(serde_json::from_slice(&json)?)
}
