//! AMA-State: memory stores for the AMA evaluation loop
//!
//! This crate owns every memory entry the loop reads and writes. Stores are
//! append-only: entries are added by dialogue summarisation or correction
//! injection and never edited or removed.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: per-user isolation, serialised writes, verifiable artifacts.
//!
//! ## Key Components
//!
//! - `MemoryStore`: the store capability set
//! - `JsonFileStore`: one JSON file per user, keyword search
//! - `VectorStore`: embedding-ranked search over a `JsonFileStore`
//! - `read_artifact`: digest-verified artifact loading

mod artifact;
mod error;
pub mod json_store;
pub mod locks;
mod schema;
pub mod storage_traits;
pub mod vector_store;

pub use artifact::{digest_path, read_artifact, write_artifact, write_atomic};
pub use error::{StorageError, StorageResult};
pub use json_store::JsonFileStore;
pub use locks::UserLocks;
pub use schema::{
    ArtifactRef, BuildReport, BuildStatus, Correction, EntryMetadata, MemoryEntry, MemorySource,
};
pub use storage_traits::{validate_user_id, ContentDigest, MemoryStore, SearchMethod};
pub use vector_store::VectorStore;
