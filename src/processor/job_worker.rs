//! Per-worker claim loop and per-job processing: the
//! hardest component in the system, because it must parallelize safely,
//! survive crashes without reprocessing, deduplicate across the whole
//! corpus, and write efficiently.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::postgres::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::db::{checkpoint_store, file_store, job_store};
use crate::db::file_store::PendingFile;
use crate::db::models::ProcessingJob;
use crate::error::PipelineError;
use crate::hashing::content_hash;
use crate::retry::{retry_with_policy, RetryPolicy};

use super::dedup::DedupSet;
use super::quality_score::score_file;
use super::walker::walk_candidates;

const BATCH_FLUSH_SIZE: usize = 100;
const CLAIM_PAGE_SIZE: i64 = 20;
const IDLE_BACKOFF: Duration = Duration::from_secs(5);
const CHECKPOINT_EVERY_N_JOBS: u32 = 10;
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(300);

pub struct ProcessorWorker {
    pool: PgPool,
    worker_id: String,
    dedup: Arc<DedupSet>,
    cancel: CancellationToken,
    db_breaker: Arc<CircuitBreaker>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub files_processed: u64,
}

impl ProcessorWorker {
    pub fn new(
        pool: PgPool,
        worker_id: String,
        dedup: Arc<DedupSet>,
        cancel: CancellationToken,
        db_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self { pool, worker_id, dedup, cancel, db_breaker }
    }

    /// Runs `op` under the default network retry policy, with each attempt
    /// guarded by `db_breaker` — the same composition `search_index` and
    /// `clone_scheduler` use for their external calls.
    async fn with_db_guard<F, Fut, T>(&self, op: F) -> Result<T, PipelineError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        let policy = RetryPolicy::default_network();
        retry_with_policy(&policy, || self.db_breaker.call(&op)).await
    }

    /// Runs the claim loop until cancelled, checkpointing on cadence and on
    /// exit, mirroring each completed/failed job into `live` so a caller can
    /// read real progress while the loop is still running.
    pub async fn run_with_live_counters(
        &self,
        live: &super::LiveCounters,
    ) -> Result<WorkerStats, PipelineError> {
        let checkpoint = self
            .with_db_guard(|| checkpoint_store::load(&self.pool, &self.worker_id))
            .await?;
        let mut cumulative_files = checkpoint.map(|c| c.cumulative_files_processed).unwrap_or(0);
        let mut last_job_id: Option<i64> = None;

        let mut stats = WorkerStats::default();
        let mut jobs_since_checkpoint = 0u32;
        let mut last_checkpoint_at = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let claimable = self
                .with_db_guard(|| job_store::fetch_claimable(&self.pool, CLAIM_PAGE_SIZE))
                .await?;
            if claimable.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                    _ = self.cancel.cancelled() => break,
                }
                continue;
            }

            let mut claimed_any = false;
            for job in claimable {
                if self.cancel.is_cancelled() {
                    break;
                }
                let claimed = self
                    .with_db_guard(|| job_store::try_claim(&self.pool, job.id, &self.worker_id))
                    .await?;
                if !claimed {
                    continue;
                }
                claimed_any = true;

                match self.process_job(&job).await {
                    Ok(files_processed) => {
                        stats.jobs_completed += 1;
                        stats.files_processed += files_processed as u64;
                        cumulative_files += files_processed as i64;
                        last_job_id = Some(job.id);
                        live.jobs_completed.fetch_add(1, Ordering::Relaxed);
                        live.files_processed.fetch_add(files_processed as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(job_id = job.id, error = %e, "job failed");
                        let message = e.to_string();
                        self.with_db_guard(|| job_store::mark_failed(&self.pool, job.id, &message))
                            .await?;
                        stats.jobs_failed += 1;
                        live.jobs_failed.fetch_add(1, Ordering::Relaxed);
                        last_job_id = Some(job.id);
                    }
                }

                jobs_since_checkpoint += 1;
                let due_by_count = jobs_since_checkpoint >= CHECKPOINT_EVERY_N_JOBS;
                let due_by_time = last_checkpoint_at.elapsed() >= CHECKPOINT_INTERVAL;
                if due_by_count || due_by_time {
                    self.with_db_guard(|| {
                        checkpoint_store::save(&self.pool, &self.worker_id, last_job_id, cumulative_files)
                    })
                    .await?;
                    jobs_since_checkpoint = 0;
                    last_checkpoint_at = Instant::now();
                }
            }

            if !claimed_any {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                    _ = self.cancel.cancelled() => break,
                }
            }
        }

        self.with_db_guard(|| checkpoint_store::save(&self.pool, &self.worker_id, last_job_id, cumulative_files))
            .await?;
        info!(
            worker_id = %self.worker_id,
            jobs_completed = stats.jobs_completed,
            jobs_failed = stats.jobs_failed,
            files_processed = stats.files_processed,
            "worker shutting down"
        );
        Ok(stats)
    }

    /// Walks, scores, deduplicates, and batch-inserts one job's repository.
    /// Returns the number of files actually inserted.
    async fn process_job(&self, job: &ProcessingJob) -> Result<i32, PipelineError> {
        let repo_root = Path::new(&job.clone_path);
        let repo_name = repo_root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

        let candidates = walk_candidates(repo_root);
        let files_found = candidates.len() as i32;

        let mut files_processed = 0i32;
        let mut batch: Vec<PendingFile> = Vec::with_capacity(BATCH_FLUSH_SIZE);
        let mut batch_hashes: Vec<[u8; 16]> = Vec::with_capacity(BATCH_FLUSH_SIZE);

        for candidate in candidates {
            let Ok(bytes) = std::fs::read(&candidate.absolute_path) else {
                continue;
            };
            let Ok(content) = String::from_utf8(bytes.clone()) else {
                continue;
            };

            let hash = content_hash(&bytes);
            if !self.dedup.insert(hash) {
                continue;
            }

            let quality_score = score_file(&content, candidate.language, &candidate.repo_relative_path);
            let line_count = content.lines().count() as i32;

            batch.push(PendingFile {
                job_id: job.id,
                absolute_path: candidate.absolute_path.to_string_lossy().to_string(),
                repo_relative_path: candidate.repo_relative_path,
                content,
                language: candidate.language.to_string(),
                line_count,
                byte_size: candidate.byte_size as i64,
                content_hash: hash,
                repo_name: repo_name.clone(),
                quality_score,
            });
            batch_hashes.push(hash);

            if batch.len() >= BATCH_FLUSH_SIZE {
                files_processed += self.flush_batch(&mut batch, &mut batch_hashes).await;
            }
        }

        if !batch.is_empty() {
            files_processed += self.flush_batch(&mut batch, &mut batch_hashes).await;
        }

        self.with_db_guard(|| job_store::mark_completed(&self.pool, job.id, files_found, files_processed))
            .await?;
        Ok(files_processed)
    }

    /// Flushes one batch. On failure, the whole batch is rolled back in
    /// the database (handled by `file_store::insert_batch`'s transaction)
    /// and the speculative dedup-set inserts for this batch are undone too,
    /// so a retried file isn't silently treated as a duplicate.
    async fn flush_batch(&self, batch: &mut Vec<PendingFile>, batch_hashes: &mut Vec<[u8; 16]>) -> i32 {
        let rows: &[PendingFile] = batch;
        match self.with_db_guard(|| file_store::insert_batch(&self.pool, rows)).await {
            Ok(()) => {
                let inserted = batch.len() as i32;
                batch.clear();
                batch_hashes.clear();
                inserted
            }
            Err(e) => {
                warn!(error = %e, batch_size = batch.len(), "batch insert failed, rolling back");
                for hash in batch_hashes.iter() {
                    self.dedup.remove(hash);
                }
                batch.clear();
                batch_hashes.clear();
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // Full claim-loop and batch-rollback behavior require a live Postgres
    // instance and are covered by `tests/job_claim_race.rs` and
    // `tests/batch_rollback.rs`. `flush_batch`'s dedup-rollback guarantee
    // is exercised indirectly there since it needs `insert_batch` to fail.
}
