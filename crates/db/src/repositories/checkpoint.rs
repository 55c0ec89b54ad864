use sqlx::Row;

use dermadesk_core::domain::checkpoint::Checkpoint;
use dermadesk_core::domain::session::SessionId;

use super::{CheckpointRepository, RepositoryError};
use crate::DbPool;

/// One row per session holding the serialized conversation and the pending call set.
pub struct SqlCheckpointRepository {
    pool: DbPool,
}

impl SqlCheckpointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CheckpointRepository for SqlCheckpointRepository {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM session_checkpoints WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String =
            row.try_get("payload_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let checkpoint = serde_json::from_str::<Checkpoint>(&payload).map_err(|e| {
            RepositoryError::Decode(format!("checkpoint for session `{session_id}`: {e}"))
        })?;

        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(checkpoint).map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO session_checkpoints (session_id, flow_state, payload_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 flow_state = excluded.flow_state,
                 payload_json = excluded.payload_json,
                 updated_at = excluded.updated_at",
        )
        .bind(checkpoint.session_id.as_str())
        .bind(checkpoint.flow_state.as_str())
        .bind(payload)
        .bind(checkpoint.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM session_checkpoints WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
