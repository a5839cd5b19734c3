//! Relational-store access: pool setup, schema bootstrap, and
//! per-table stores.

pub mod checkpoint_store;
pub mod file_store;
pub mod job_store;
pub mod models;
pub mod repo_store;

use sqlx::postgres::{PgPoolOptions, PgPool};
use std::time::Duration;

use crate::error::PipelineError;

/// Connection pool shared per process — min=2, max=20.
pub async fn connect(db_url: &str) -> Result<PgPool, PipelineError> {
    PgPoolOptions::new()
        .min_connections(2)
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(15))
        .connect(db_url)
        .await
        .map_err(|e| {
            PipelineError::permanent_run(format!("cannot reach database at {}: {}", db_url, e))
        })
}

/// Creates the four tables and their indexes idempotently.
/// Schema is owned by the Processor; the Crawler and Downloader only
/// SELECT/upsert on existing columns, but all binaries call this at startup
/// so a fresh database works regardless of start order.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            id BIGSERIAL PRIMARY KEY,
            display_name TEXT NOT NULL,
            full_name TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL,
            language TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            stars BIGINT NOT NULL DEFAULT 0,
            forks BIGINT NOT NULL DEFAULT 0,
            topics TEXT[] NOT NULL DEFAULT '{}',
            discovered_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            quality_score INTEGER NOT NULL DEFAULT 0,
            clone_status TEXT NOT NULL DEFAULT 'pending',
            local_path TEXT,
            size_kb BIGINT NOT NULL DEFAULT 0,
            file_count INTEGER NOT NULL DEFAULT 0,
            lines_of_code BIGINT NOT NULL DEFAULT 0,
            last_cloned_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_jobs (
            id BIGSERIAL PRIMARY KEY,
            clone_path TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'pending',
            files_found INTEGER NOT NULL DEFAULT 0,
            files_processed INTEGER NOT NULL DEFAULT 0,
            worker_id TEXT,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_files (
            id BIGSERIAL PRIMARY KEY,
            job_id BIGINT NOT NULL REFERENCES processing_jobs(id),
            absolute_path TEXT NOT NULL,
            repo_relative_path TEXT NOT NULL,
            content TEXT NOT NULL,
            language TEXT NOT NULL,
            line_count INTEGER NOT NULL,
            byte_size BIGINT NOT NULL,
            content_hash BYTEA NOT NULL UNIQUE,
            repo_name TEXT NOT NULL,
            quality_score INTEGER NOT NULL,
            processed_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_checkpoints (
            worker_id TEXT PRIMARY KEY,
            last_job_id BIGINT,
            cumulative_files_processed BIGINT NOT NULL DEFAULT 0,
            checkpoint_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_processed_files_language ON processed_files (language)",
        "CREATE INDEX IF NOT EXISTS idx_processed_files_quality ON processed_files (quality_score DESC)",
        "CREATE INDEX IF NOT EXISTS idx_processed_files_repo ON processed_files (repo_name)",
        "CREATE INDEX IF NOT EXISTS idx_processed_files_processed_at ON processed_files (processed_at)",
        "CREATE INDEX IF NOT EXISTS idx_processing_jobs_status ON processing_jobs (status)",
    ];
    for idx in indexes {
        sqlx::query(idx).execute(pool).await?;
    }

    Ok(())
}
