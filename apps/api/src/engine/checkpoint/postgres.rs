//! PostgreSQL-backed checkpoint store. One row per thread, upserted on every write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use super::{Checkpoint, CheckpointStore};
use crate::engine::error::CheckpointError;

#[derive(Clone)]
pub struct PostgresCheckpointStore {
    pool: PgPool,
}

impl PostgresCheckpointStore {
    /// Wraps `pool` and creates the `checkpoints` table if it is missing.
    pub async fn new(pool: PgPool) -> Result<Self, CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id   TEXT PRIMARY KEY,
                workflow    TEXT NOT NULL,
                data        JSONB NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("Postgres checkpoint store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT data FROM checkpoints WHERE thread_id = $1")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(data,)| serde_json::from_value(data))
            .transpose()
            .map_err(CheckpointError::from)
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let data = serde_json::to_value(checkpoint)?;
        let updated_at: DateTime<Utc> = checkpoint.updated_at;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, workflow, data, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (thread_id)
            DO UPDATE SET workflow = EXCLUDED.workflow, data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(&checkpoint.workflow)
        .bind(data)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = $1")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
