//! Read-only metrics collection: seven counter/gauge
//! categories queried from the relational store every 15s. Never writes
//! to any shared store.

use std::collections::HashMap;

use sqlx::postgres::PgPool;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub jobs_by_status: HashMap<String, i64>,
    pub files_total: i64,
    pub files_by_language: HashMap<String, i64>,
    pub files_per_worker: HashMap<String, i64>,
    pub files_per_repo: HashMap<String, i64>,
    pub bytes_per_repo: HashMap<String, i64>,
    pub files_per_minute: f64,
    pub jobs_per_hour: f64,
    pub database_size_bytes: i64,
}

/// Runs all seven queries. Each is independent and a failure in one
/// doesn't need to block the others, but since this endpoint is scraped on
/// a tight interval and failures here mean "the collector itself is
/// unhealthy," the whole snapshot fails together and `/health` will also
/// start failing soon after.
pub async fn collect(pool: &PgPool) -> Result<MetricsSnapshot, PipelineError> {
    let jobs_by_status = jobs_by_status(pool).await?;
    let (files_total, files_by_language) = files_total_and_by_language(pool).await?;
    let files_per_worker = files_per_worker(pool).await?;
    let (files_per_repo, bytes_per_repo) = per_repo_stats(pool).await?;
    let files_per_minute = files_per_minute(pool).await?;
    let jobs_per_hour = jobs_per_hour(pool).await?;
    let database_size_bytes = database_size_bytes(pool).await?;

    Ok(MetricsSnapshot {
        jobs_by_status,
        files_total,
        files_by_language,
        files_per_worker,
        files_per_repo,
        bytes_per_repo,
        files_per_minute,
        jobs_per_hour,
        database_size_bytes,
    })
}

async fn jobs_by_status(pool: &PgPool) -> Result<HashMap<String, i64>, PipelineError> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM processing_jobs GROUP BY status")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

async fn files_total_and_by_language(
    pool: &PgPool,
) -> Result<(i64, HashMap<String, i64>), PipelineError> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT language, COUNT(*) FROM processed_files GROUP BY language")
            .fetch_all(pool)
            .await?;
    let total = rows.iter().map(|(_, c)| c).sum();
    Ok((total, rows.into_iter().collect()))
}

async fn files_per_worker(pool: &PgPool) -> Result<HashMap<String, i64>, PipelineError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT pj.worker_id, COUNT(pf.id)
        FROM processed_files pf
        JOIN processing_jobs pj ON pj.id = pf.job_id
        WHERE pj.worker_id IS NOT NULL
        GROUP BY pj.worker_id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

async fn per_repo_stats(
    pool: &PgPool,
) -> Result<(HashMap<String, i64>, HashMap<String, i64>), PipelineError> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT repo_name, COUNT(*), COALESCE(SUM(byte_size), 0) FROM processed_files GROUP BY repo_name",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = HashMap::with_capacity(rows.len());
    let mut bytes = HashMap::with_capacity(rows.len());
    for (repo, count, byte_sum) in rows {
        counts.insert(repo.clone(), count);
        bytes.insert(repo, byte_sum);
    }
    Ok((counts, bytes))
}

async fn files_per_minute(pool: &PgPool) -> Result<f64, PipelineError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM processed_files WHERE processed_at > now() - interval '15 minutes'",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0 as f64 / 15.0)
}

async fn jobs_per_hour(pool: &PgPool) -> Result<f64, PipelineError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM processing_jobs WHERE completed_at > now() - interval '6 hours'",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0 as f64 / 6.0)
}

async fn database_size_bytes(pool: &PgPool) -> Result<i64, PipelineError> {
    let row: (i64,) = sqlx::query_as("SELECT pg_database_size(current_database())")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Renders a snapshot as line-oriented `key value` pairs for the `/metrics`
/// endpoint — intentionally not Prometheus exposition format, kept
/// hand-rolled and matched to what the relational store can cheaply answer.
/// Every name is prefixed `counter_` (monotonic, grows as the corpus grows)
/// or `gauge_` (can move in either direction) so a scraper can tell the two
/// apart without consulting this module's source.
pub fn render_text(snapshot: &MetricsSnapshot) -> String {
    let mut lines = Vec::new();

    for (status, count) in &snapshot.jobs_by_status {
        lines.push(format!("gauge_jobs_by_status{{status=\"{}\"}} {}", status, count));
    }
    lines.push(format!("counter_files_total {}", snapshot.files_total));
    for (language, count) in &snapshot.files_by_language {
        lines.push(format!("counter_files_by_language{{language=\"{}\"}} {}", language, count));
    }
    for (worker, count) in &snapshot.files_per_worker {
        lines.push(format!("counter_files_per_worker{{worker=\"{}\"}} {}", worker, count));
    }
    for (repo, count) in &snapshot.files_per_repo {
        lines.push(format!("counter_files_per_repo{{repo=\"{}\"}} {}", repo, count));
    }
    for (repo, bytes) in &snapshot.bytes_per_repo {
        lines.push(format!("counter_bytes_per_repo{{repo=\"{}\"}} {}", repo, bytes));
    }
    lines.push(format!("gauge_files_per_minute {:.3}", snapshot.files_per_minute));
    lines.push(format!("gauge_jobs_per_hour {:.3}", snapshot.jobs_per_hour));
    lines.push(format!("gauge_database_size_bytes {}", snapshot.database_size_bytes));

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_text_includes_every_category() {
        let mut snapshot = MetricsSnapshot::default();
        snapshot.jobs_by_status.insert("pending".into(), 3);
        snapshot.files_by_language.insert("Rust".into(), 10);
        snapshot.files_total = 10;
        snapshot.database_size_bytes = 1024;

        let text = render_text(&snapshot);
        assert!(text.contains("gauge_jobs_by_status{status=\"pending\"} 3"));
        assert!(text.contains("counter_files_by_language{language=\"Rust\"} 10"));
        assert!(text.contains("counter_files_total 10"));
        assert!(text.contains("gauge_database_size_bytes 1024"));
    }
}
