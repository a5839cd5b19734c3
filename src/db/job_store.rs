//! `processing_jobs` table access, including the atomic claim predicate
//! that is the Processor's sole worker-serialization primitive.

use chrono::Utc;
use sqlx::postgres::PgPool;

use crate::error::PipelineError;

use super::models::ProcessingJob;

/// Jobs stuck in `processing` longer than this are assumed abandoned by a
/// crashed worker and become reclaimable.
pub const STALE_THRESHOLD_MINUTES: i64 = 30;

pub async fn insert_pending_if_absent(pool: &PgPool, clone_path: &str) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO processing_jobs (clone_path, status)
        VALUES ($1, 'pending')
        ON CONFLICT (clone_path) DO NOTHING
        "#,
    )
    .bind(clone_path)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn exists_for_clone_path(pool: &PgPool, clone_path: &str) -> Result<bool, PipelineError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM processing_jobs WHERE clone_path = $1")
        .bind(clone_path)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// `UPDATE jobs SET status='processing', worker_id=?, started_at=now()
/// WHERE id=? AND status IN ('pending','failed')`. Returns
/// `true` iff this worker won the race (rows_affected == 1).
pub async fn try_claim(pool: &PgPool, job_id: i64, worker_id: &str) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE processing_jobs
        SET status = 'processing', worker_id = $2, started_at = now()
        WHERE id = $1 AND status IN ('pending', 'failed')
        "#,
    )
    .bind(job_id)
    .bind(worker_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Fetches pending jobs plus any `processing` job stale beyond the
/// threshold, oldest-claimed-first, so a worker can attempt claims.
pub async fn fetch_claimable(pool: &PgPool, limit: i64) -> Result<Vec<ProcessingJob>, PipelineError> {
    let rows = sqlx::query_as::<_, ProcessingJob>(
        r#"
        SELECT * FROM processing_jobs
        WHERE status IN ('pending', 'failed')
           OR (status = 'processing' AND started_at < now() - ($2 || ' minutes')::interval)
        ORDER BY id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .bind(STALE_THRESHOLD_MINUTES.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Explicit reaper for stale `processing` jobs, run once at worker startup:
/// resets them to `pending` so the normal claim predicate can pick them up,
/// rather than special-casing `processing` forever in every claim query.
pub async fn reclaim_stale_jobs(pool: &PgPool) -> Result<u64, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE processing_jobs
        SET status = 'pending', worker_id = NULL
        WHERE status = 'processing' AND started_at < now() - ($1 || ' minutes')::interval
        "#,
    )
    .bind(STALE_THRESHOLD_MINUTES.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_completed(
    pool: &PgPool,
    job_id: i64,
    files_found: i32,
    files_processed: i32,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE processing_jobs
        SET status = 'completed', files_found = $2, files_processed = $3, completed_at = $4
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(files_found)
    .bind(files_processed)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, job_id: i64, error_message: &str) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE processing_jobs SET status = 'failed', error_message = $2 WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}
