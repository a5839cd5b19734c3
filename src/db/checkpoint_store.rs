//! Per-worker checkpoint persistence.

use chrono::Utc;
use sqlx::postgres::PgPool;

use crate::error::PipelineError;

use super::models::ProcessingCheckpoint;

pub async fn load(pool: &PgPool, worker_id: &str) -> Result<Option<ProcessingCheckpoint>, PipelineError> {
    let row = sqlx::query_as::<_, ProcessingCheckpoint>(
        "SELECT * FROM processing_checkpoints WHERE worker_id = $1",
    )
    .bind(worker_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn save(
    pool: &PgPool,
    worker_id: &str,
    last_job_id: Option<i64>,
    cumulative_files_processed: i64,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO processing_checkpoints (worker_id, last_job_id, cumulative_files_processed, checkpoint_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (worker_id) DO UPDATE SET
            last_job_id = EXCLUDED.last_job_id,
            cumulative_files_processed = EXCLUDED.cumulative_files_processed,
            checkpoint_at = EXCLUDED.checkpoint_at
        "#,
    )
    .bind(worker_id)
    .bind(last_job_id)
    .bind(cumulative_files_processed)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}
