//! Checkpoint model and storage backends.
//!
//! A checkpoint is the persisted (state, cursor) pair of one thread. The state
//! is stored as JSON so a single store serves every workflow type; the executor
//! decodes it back into the workflow's typed state.

mod postgres;
mod redis;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::error::CheckpointError;

pub use self::postgres::PostgresCheckpointStore;
pub use self::redis::RedisCheckpointStore;

/// Where a run suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", content = "node", rename_all = "lowercase")]
pub enum Interrupt {
    Before(String),
    After(String),
}

impl Interrupt {
    pub fn node(&self) -> &str {
        match self {
            Interrupt::Before(node) | Interrupt::After(node) => node,
        }
    }
}

/// Position of a thread within its graph.
///
/// `completed` is the last node that ran and whose outgoing edges have not yet
/// been evaluated. Routing happens when execution continues, against the state
/// as it is at that moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub completed: Option<String>,
    pub pending: Vec<String>,
    pub interrupt: Option<Interrupt>,
}

impl Cursor {
    pub fn at_entry(entry: &str) -> Self {
        Self {
            completed: None,
            pending: vec![entry.to_string()],
            interrupt: None,
        }
    }

    /// Nothing left to run and nothing waiting on a router.
    pub fn is_finished(&self) -> bool {
        self.completed.is_none() && self.pending.is_empty() && self.interrupt.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Name of the graph that owns the thread.
    pub workflow: String,
    pub state: serde_json::Value,
    pub cursor: Cursor,
    /// Nodes executed over the thread's lifetime.
    pub step: usize,
    /// Node the last write is attributed to. `None` for the seeded input.
    pub source: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Persists checkpoints keyed by thread id. Implementations must allow
/// independent, interleaved access to different threads.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError>;
}

/// Process-local store. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(step: usize) -> Checkpoint {
        Checkpoint {
            workflow: "formatter".to_string(),
            state: json!({"messages": [{"role": "assistant", "content": "draft"}]}),
            cursor: Cursor {
                completed: Some("format_resume".to_string()),
                pending: vec![],
                interrupt: Some(Interrupt::After("format_resume".to_string())),
            },
            step,
            source: Some("format_resume".to_string()),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get_returns_same_checkpoint() {
        let store = MemoryCheckpointStore::new();
        let checkpoint = sample(1);

        store.put("t1", &checkpoint).await.unwrap();
        let loaded = store.get("t1").await.unwrap().unwrap();

        assert_eq!(loaded, checkpoint);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_absent() {
        let store = MemoryCheckpointStore::new();
        store.put("t1", &sample(1)).await.unwrap();
        store.delete("t1").await.unwrap();

        assert!(store.get("t1").await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let store = MemoryCheckpointStore::new();
        store.put("a", &sample(1)).await.unwrap();
        store.put("b", &sample(5)).await.unwrap();
        store.delete("a").await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(store.get("b").await.unwrap().unwrap().step, 5);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryCheckpointStore::new();
        store.put("t", &sample(1)).await.unwrap();
        store.put("t", &sample(2)).await.unwrap();
        assert_eq!(store.get("t").await.unwrap().unwrap().step, 2);
    }

    #[test]
    fn test_checkpoint_json_round_trip() {
        let checkpoint = sample(3);
        let encoded = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, checkpoint);
        assert!(encoded.contains(r#""when":"after""#));
    }

    #[test]
    fn test_cursor_finished() {
        assert!(Cursor::default().is_finished());
        assert!(!Cursor::at_entry("parse").is_finished());
    }
}
