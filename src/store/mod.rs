//! Optional persistence for [`CheckpointState`] so a consumer can resume after a restart.
use crate::checkpointer::CheckpointState;
use async_trait::async_trait;

/// Named checkpoint storage. One name per stream consumer.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Saved state for `name`, if any.
    async fn load(&self, name: &str) -> anyhow::Result<Option<CheckpointState>>;

    /// Insert or replace the state for `name`.
    async fn save(&self, name: &str, state: &CheckpointState) -> anyhow::Result<()>;

    /// Forget `name` (no-op if absent).
    async fn remove(&self, name: &str) -> anyhow::Result<()>;
}

// submodules / concrete stores live here
#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;
#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteCheckpointStore;
