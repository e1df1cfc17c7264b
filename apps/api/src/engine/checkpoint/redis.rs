//! Redis-backed checkpoint store.
//!
//! One JSON value per thread under `checkpoint:{thread_id}`, with an optional
//! expiry so abandoned threads do not accumulate.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use super::{Checkpoint, CheckpointStore};
use crate::engine::error::CheckpointError;

#[derive(Clone)]
pub struct RedisCheckpointStore {
    conn: MultiplexedConnection,
    ttl_secs: Option<u64>,
}

impl RedisCheckpointStore {
    pub async fn connect(url: &str, ttl_secs: Option<u64>) -> Result<Self, CheckpointError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        info!("Redis checkpoint store connected (ttl: {:?}s)", ttl_secs);
        Ok(Self { conn, ttl_secs })
    }

    fn key(thread_id: &str) -> String {
        format!("checkpoint:{thread_id}")
    }
}

#[async_trait]
impl CheckpointStore for RedisCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(thread_id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(CheckpointError::from)
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_string(checkpoint)?;
        let key = Self::key(thread_id);
        let mut conn = self.conn.clone();

        match self.ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, json, ttl).await?,
            None => conn.set::<_, _, ()>(key, json).await?,
        }
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(thread_id)).await?;
        Ok(())
    }
}
