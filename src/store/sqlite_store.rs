//! Embedded SQLite checkpoint store.
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use tokio::task;

use crate::{checkpointer::CheckpointState, store::CheckpointStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS checkpoints (
        name  TEXT PRIMARY KEY,
        state TEXT NOT NULL
    );
"#;

/// One row per checkpoint name:
///   checkpoints(name TEXT PRIMARY KEY, state TEXT NOT NULL)
///
/// `state` is the JSON encoding of [`CheckpointState`].
pub struct SqliteCheckpointStore {
    path: PathBuf,
}

impl SqliteCheckpointStore {
    /// Creates/initializes the SQLite file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path)
            .with_context(|| format!("open sqlite at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { path })
    }

    /// Run `f` on a fresh connection off the async threads.
    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let conn = Connection::open(&path)
                .with_context(|| format!("open sqlite at {}", path.display()))?;
            f(conn)
        })
        .await?
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, name: &str) -> anyhow::Result<Option<CheckpointState>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT state FROM checkpoints WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|s| {
                serde_json::from_str(&s).with_context(|| format!("decode checkpoint `{name}`"))
            })
            .transpose()
        })
        .await
    }

    async fn save(&self, name: &str, state: &CheckpointState) -> anyhow::Result<()> {
        let name = name.to_string();
        let encoded = serde_json::to_string(state).context("encode checkpoint")?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints(name, state) VALUES(?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET state = excluded.state",
                params![name, encoded],
            )?;
            tracing::trace!(checkpoint = %name, "checkpoint saved");
            Ok(())
        })
        .await
    }

    async fn remove(&self, name: &str) -> anyhow::Result<()> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM checkpoints WHERE name = ?1", params![name])?;
            Ok(())
        })
        .await
    }
}
