//! Dispatcher + bounded worker pool cloning qualifying repositories to
//! local storage. Producer/consumer shape over a buffered
//! `tokio::sync::mpsc` channel, scaled down to a single clone stage.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::PgPool;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::circuit_breaker::CircuitBreaker;
use crate::db::repo_store;
use crate::error::PipelineError;
use crate::rate_limiter::RateLimiter;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::search_index::descriptor::RepositoryDescriptor;
use crate::storage::{select_write_root, LocalStorageRoot, StorageRoot};

use super::quality_filter::rescore_with_size;
use super::LiveCounters;

pub const CHANNEL_BUFFER_SIZE: usize = 1000;
pub const DEFAULT_WORKER_COUNT: usize = 3;
pub const CLONE_RATE_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(600);
const SPACE_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy)]
pub struct CloneStats {
    pub attempted: u64,
    pub cloned: u64,
    pub failed: u64,
}

/// A repository record already upserted with `status = pending` (so it has
/// a surrogate id) and its originating descriptor, ready to be cloned.
#[derive(Debug, Clone)]
pub struct CloneCandidate {
    pub repository_id: i64,
    pub descriptor: RepositoryDescriptor,
    pub quality_score: i32,
}

pub struct CloneScheduler {
    pool: PgPool,
    roots: Vec<PathBuf>,
    limiter: Arc<RateLimiter>,
    git_breaker: Arc<CircuitBreaker>,
    workers: usize,
    clone_timeout: Duration,
}

impl CloneScheduler {
    pub fn new(pool: PgPool, roots: Vec<PathBuf>, workers: usize, clone_timeout: Duration) -> Self {
        Self {
            pool,
            roots,
            limiter: Arc::new(RateLimiter::new(CLONE_RATE_INTERVAL)),
            git_breaker: Arc::new(CircuitBreaker::new("git-clone")),
            workers: workers.max(1),
            clone_timeout,
        }
    }

    /// Drains `descriptors` through the dispatcher/worker pool and returns
    /// aggregate stats. The dispatcher runs in its own task so a full
    /// channel never blocks the caller. `live` mirrors progress for a
    /// caller reading it before this future resolves.
    pub async fn run(
        &self,
        candidates: Vec<CloneCandidate>,
        live: Arc<LiveCounters>,
    ) -> Result<CloneStats, PipelineError> {
        let (tx, rx) = mpsc::channel::<CloneCandidate>(CHANNEL_BUFFER_SIZE);
        let rx = Arc::new(Mutex::new(rx));

        let dispatch_pool = self.pool.clone();
        let dispatch_handle = tokio::spawn(async move {
            for candidate in candidates {
                if repo_store::is_already_cloned(&dispatch_pool, &candidate.descriptor.full_name)
                    .await
                    .unwrap_or(false)
                {
                    continue;
                }
                if tx.send(candidate).await.is_err() {
                    break;
                }
            }
        });

        let stats = Arc::new(Mutex::new(CloneStats::default()));
        let mut worker_handles = Vec::new();

        for worker_id in 0..self.workers {
            let pool = self.pool.clone();
            let limiter = Arc::clone(&self.limiter);
            let git_breaker = Arc::clone(&self.git_breaker);
            let stats = Arc::clone(&stats);
            let live = Arc::clone(&live);
            let clone_timeout = self.clone_timeout;
            let rx = Arc::clone(&rx);
            let roots = self.roots.clone();

            worker_handles.push(tokio::spawn(async move {
                loop {
                    let candidate = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(candidate) = candidate else {
                        break;
                    };

                    limiter.acquire().await;
                    stats.lock().await.attempted += 1;
                    live.clone_attempted.fetch_add(1, Ordering::Relaxed);

                    match clone_one(&pool, &candidate, &roots, clone_timeout, &git_breaker).await {
                        Ok(()) => {
                            stats.lock().await.cloned += 1;
                            live.clone_succeeded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!(worker_id, full_name = %candidate.descriptor.full_name, error = %e, "clone failed");
                            stats.lock().await.failed += 1;
                            live.clone_failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }));
        }

        dispatch_handle.await.ok();
        for h in worker_handles {
            h.await.ok();
        }

        let final_stats = *stats.lock().await;
        info!(
            attempted = final_stats.attempted,
            cloned = final_stats.cloned,
            failed = final_stats.failed,
            "clone run complete"
        );
        Ok(final_stats)
    }
}

/// Polls the free space of every configured root, pausing (not dropping
/// the job) while all roots are below threshold.
async fn wait_for_write_root(roots: &[PathBuf]) -> PathBuf {
    loop {
        let boxed: Vec<Box<dyn StorageRoot>> = roots
            .iter()
            .map(|p| Box::new(LocalStorageRoot::new(p.clone())) as Box<dyn StorageRoot>)
            .collect();

        if let Some(chosen) = select_write_root(&boxed) {
            return chosen.write_root().to_path_buf();
        }

        warn!("all storage roots below low-space threshold, pausing clone worker");
        tokio::time::sleep(SPACE_RETRY_INTERVAL).await;
    }
}

/// Runs one `git clone --depth 1` attempt, classifying the outcome so the
/// retry wrapper above it knows what's worth retrying: a bad remote or
/// non-zero exit is permanent, a timeout or failure to even spawn `git` is
/// transient.
async fn run_git_clone(url: &str, dest: &Path, clone_timeout: Duration) -> Result<(), PipelineError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::transient(format!("failed to create {:?}: {}", parent, e)))?;
    }

    let clone_result = timeout(
        clone_timeout,
        Command::new("git")
            .args(["clone", "--depth", "1", url, dest.to_string_lossy().as_ref()])
            .output(),
    )
    .await;

    match clone_result {
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => {
            let message = String::from_utf8_lossy(&output.stderr).to_string();
            Err(PipelineError::permanent_unit(format!("git clone failed: {}", message)))
        }
        Ok(Err(e)) => Err(PipelineError::transient(format!("failed to spawn git: {}", e))),
        Err(_) => Err(PipelineError::transient("git clone timed out")),
    }
}

async fn clone_one(
    pool: &PgPool,
    candidate: &CloneCandidate,
    roots: &[PathBuf],
    clone_timeout: Duration,
    git_breaker: &CircuitBreaker,
) -> Result<(), PipelineError> {
    let descriptor = &candidate.descriptor;
    let root = wait_for_write_root(roots).await;
    let dest = crate::storage::clone_path(
        &root,
        &descriptor.language,
        owner_of(&descriptor.full_name),
        repo_of(&descriptor.full_name),
    );

    let policy = RetryPolicy::default_network();
    let clone_result = retry_with_policy(&policy, || {
        let dest = dest.clone();
        let url = descriptor.url.clone();
        async move { git_breaker.call(|| run_git_clone(&url, &dest, clone_timeout)).await }
    })
    .await;

    if let Err(e) = clone_result {
        repo_store::mark_failed(pool, candidate.repository_id, &e.to_string()).await?;
        return Err(e);
    }

    let (file_count, lines_of_code, size_kb) = walk_clone_stats(&dest);
    let quality_score = rescore_with_size(candidate.quality_score, size_kb);

    repo_store::mark_cloned(
        pool,
        candidate.repository_id,
        dest.to_string_lossy().as_ref(),
        size_kb,
        file_count as i32,
        lines_of_code,
        Utc::now(),
        quality_score,
    )
    .await?;

    Ok(())
}

fn walk_clone_stats(root: &Path) -> (i64, i64, i64) {
    let mut file_count = 0i64;
    let mut lines_of_code = 0i64;
    let mut total_bytes = 0i64;

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.path().components().any(|c| c.as_os_str() == ".git") {
            continue;
        }

        file_count += 1;
        if let Ok(metadata) = entry.metadata() {
            total_bytes += metadata.len() as i64;
        }
        if let Ok(content) = std::fs::read_to_string(entry.path()) {
            lines_of_code += content.lines().count() as i64;
        }
    }

    (file_count, lines_of_code, total_bytes / 1024)
}

fn owner_of(full_name: &str) -> &str {
    full_name.split_once('/').map(|(o, _)| o).unwrap_or(full_name)
}

fn repo_of(full_name: &str) -> &str {
    full_name.split_once('/').map(|(_, r)| r).unwrap_or(full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_repo_split_full_name() {
        assert_eq!(owner_of("rust-lang/rust"), "rust-lang");
        assert_eq!(repo_of("rust-lang/rust"), "rust");
    }
}
