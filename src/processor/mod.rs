//! Processor component: the hardest component in the system.
//! Discovers repositories, claims jobs atomically, walks and scores files,
//! deduplicates across the whole corpus, and writes in batches.

pub mod dedup;
pub mod discovery;
pub mod job_worker;
pub mod quality_score;
pub mod walker;

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use sqlx::postgres::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::circuit_breaker::CircuitBreaker;
use crate::db::{file_store, job_store};
use crate::error::PipelineError;

use dedup::DedupSet;
use job_worker::{ProcessorWorker, WorkerStats};

/// Live counters a caller can read while `run` is still in flight, updated
/// as each worker completes a job.
#[derive(Default)]
pub struct LiveCounters {
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub files_processed: AtomicU64,
}

/// Runs schema-bootstrap-adjacent startup steps, then drives `worker_count` concurrent claim loops
/// sharing one process-wide dedup set until `cancel` fires.
pub async fn run(
    pool: PgPool,
    storage_roots: &[PathBuf],
    worker_count: usize,
    worker_id_prefix: &str,
    cancel: CancellationToken,
    live: Arc<LiveCounters>,
) -> Result<Vec<WorkerStats>, PipelineError> {
    let reclaimed = job_store::reclaim_stale_jobs(&pool).await?;
    if reclaimed > 0 {
        info!(reclaimed, "reclaimed stale processing jobs");
    }

    let discovered = discovery::discover(&pool, storage_roots).await?;
    info!(discovered, "discovery pass complete");

    let known_hashes = file_store::load_known_hashes(&pool).await?;
    info!(known_hashes = known_hashes.len(), "loaded dedup set");
    let dedup = Arc::new(DedupSet::from_known(known_hashes));
    let db_breaker = Arc::new(CircuitBreaker::new("processor-db"));

    let mut handles = Vec::new();
    for idx in 0..worker_count.max(1) {
        let pool = pool.clone();
        let dedup = Arc::clone(&dedup);
        let cancel = cancel.clone();
        let db_breaker = Arc::clone(&db_breaker);
        let live = Arc::clone(&live);
        let worker_id = format!("{}-{}", worker_id_prefix, idx);

        handles.push(tokio::spawn(async move {
            let worker = ProcessorWorker::new(pool, worker_id, dedup, cancel, db_breaker);
            worker.run_with_live_counters(&live).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Ok(stats)) => results.push(stats),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => {
                return Err(PipelineError::permanent_run(format!(
                    "processor worker task panicked: {}",
                    join_err
                )))
            }
        }
    }

    Ok(results)
}
