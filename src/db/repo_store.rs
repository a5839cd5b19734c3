//! `repositories` table access — written by the Downloader, read by the
//! Processor's discovery step and the Metrics Exporter.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use crate::error::PipelineError;
use crate::search_index::descriptor::RepositoryDescriptor;

use super::models::{CloneStatus, RepositoryRecord};

/// Upsert keyed on `full_name`.
pub async fn upsert_pending(
    pool: &PgPool,
    descriptor: &RepositoryDescriptor,
    quality_score: i32,
) -> Result<i64, PipelineError> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO repositories
            (display_name, full_name, url, language, description, stars, forks, topics, discovered_at, quality_score, clone_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending')
        ON CONFLICT (full_name) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            url = EXCLUDED.url,
            language = EXCLUDED.language,
            description = EXCLUDED.description,
            stars = EXCLUDED.stars,
            forks = EXCLUDED.forks,
            topics = EXCLUDED.topics,
            quality_score = EXCLUDED.quality_score
        RETURNING id
        "#,
    )
    .bind(&descriptor.display_name)
    .bind(&descriptor.full_name)
    .bind(&descriptor.url)
    .bind(&descriptor.language)
    .bind(&descriptor.description)
    .bind(descriptor.stars as i64)
    .bind(descriptor.forks as i64)
    .bind(&descriptor.topics)
    .bind(descriptor.discovered_at)
    .bind(quality_score)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn is_already_cloned(pool: &PgPool, full_name: &str) -> Result<bool, PipelineError> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM repositories WHERE full_name = $1 AND clone_status = 'cloned'",
    )
    .bind(full_name)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Reads pending descriptors ordered by stars descending, paginated.
pub async fn fetch_pending_page(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<RepositoryRecord>, PipelineError> {
    let rows = sqlx::query_as::<_, RepositoryRecord>(
        "SELECT * FROM repositories WHERE clone_status = 'pending' ORDER BY stars DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
pub async fn mark_cloned(
    pool: &PgPool,
    id: i64,
    local_path: &str,
    size_kb: i64,
    file_count: i32,
    lines_of_code: i64,
    cloned_at: DateTime<Utc>,
    quality_score: i32,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE repositories
        SET clone_status = $2, local_path = $3, size_kb = $4, file_count = $5,
            lines_of_code = $6, last_cloned_at = $7, quality_score = $8
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(CloneStatus::Cloned.as_str())
    .bind(local_path)
    .bind(size_kb)
    .bind(file_count)
    .bind(lines_of_code)
    .bind(cloned_at)
    .bind(quality_score)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: i64, error: &str) -> Result<(), PipelineError> {
    sqlx::query("UPDATE repositories SET clone_status = $2 WHERE id = $1")
        .bind(id)
        .bind(CloneStatus::Failed.as_str())
        .execute(pool)
        .await?;
    tracing::warn!(repo_id = id, error, "clone failed");
    Ok(())
}

pub async fn mark_filtered(pool: &PgPool, descriptor: &RepositoryDescriptor) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO repositories (display_name, full_name, url, language, description, stars, forks, topics, discovered_at, quality_score, clone_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 'filtered')
        ON CONFLICT (full_name) DO UPDATE SET clone_status = 'filtered'
        "#,
    )
    .bind(&descriptor.display_name)
    .bind(&descriptor.full_name)
    .bind(&descriptor.url)
    .bind(&descriptor.language)
    .bind(&descriptor.description)
    .bind(descriptor.stars as i64)
    .bind(descriptor.forks as i64)
    .bind(&descriptor.topics)
    .bind(descriptor.discovered_at)
    .execute(pool)
    .await?;
    Ok(())
}
