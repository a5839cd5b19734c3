//! `processed_files` table access: dedup-set bootstrap and batched insert
//! with whole-batch rollback on any row error.

use chrono::Utc;
use sqlx::postgres::PgPool;

use crate::error::PipelineError;
use crate::hashing::ContentHash;

/// One in-memory row awaiting a batch flush.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub job_id: i64,
    pub absolute_path: String,
    pub repo_relative_path: String,
    pub content: String,
    pub language: String,
    pub line_count: i32,
    pub byte_size: i64,
    pub content_hash: ContentHash,
    pub repo_name: String,
    pub quality_score: i32,
}

/// Loads every stored content hash into memory so the per-worker dedup
/// check is O(1). Exact set, acceptable at corpus scale.
pub async fn load_known_hashes(pool: &PgPool) -> Result<Vec<ContentHash>, PipelineError> {
    let rows: Vec<(Vec<u8>,)> = sqlx::query_as("SELECT content_hash FROM processed_files")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(bytes,)| bytes.try_into().ok())
        .collect())
}

/// Inserts a batch inside one transaction. Any individual row error aborts
/// and rolls back the whole transaction; the caller is
/// responsible for also rolling back the hashes it speculatively added to
/// the in-memory dedup set for this batch.
pub async fn insert_batch(pool: &PgPool, batch: &[PendingFile]) -> Result<(), PipelineError> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    for file in batch {
        sqlx::query(
            r#"
            INSERT INTO processed_files
                (job_id, absolute_path, repo_relative_path, content, language, line_count, byte_size, content_hash, repo_name, quality_score, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(file.job_id)
        .bind(&file.absolute_path)
        .bind(&file.repo_relative_path)
        .bind(&file.content)
        .bind(&file.language)
        .bind(file.line_count)
        .bind(file.byte_size)
        .bind(file.content_hash.as_slice())
        .bind(&file.repo_name)
        .bind(file.quality_score)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            PipelineError::from(e).with_context("repo_relative_path", file.repo_relative_path.clone())
        })?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // Dedup and batch-rollback behavior require a live Postgres instance;
    // covered by `tests/dedup_idempotence.rs` and
    // `tests/batch_rollback.rs`. Unit-testable logic lives in
    // `processor::job_worker`'s in-memory batching, tested there.
}
