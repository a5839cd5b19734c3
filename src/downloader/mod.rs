//! Downloader component: reads descriptors from the search
//! index, filters them, and clones the survivors to local storage.

pub mod clone_scheduler;
pub mod quality_filter;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPool;
use tracing::info;

use crate::db::repo_store;
use crate::error::PipelineError;
use crate::search_index::SearchIndexClient;

use clone_scheduler::{CloneCandidate, CloneScheduler, CloneStats};
use quality_filter::{FilterOutcome, QualityFilter};

const PAGE_SIZE: u64 = 200;

#[derive(Debug, Default, Clone, Copy)]
pub struct DownloaderStats {
    pub scanned: u64,
    pub filtered: u64,
    pub passed: u64,
    pub clone: CloneStats,
}

/// Live counters a caller can read while `Downloader::run` is still in
/// flight: scan/filter progress plus whatever the clone scheduler reports.
#[derive(Default)]
pub struct LiveCounters {
    pub scanned: AtomicU64,
    pub passed: AtomicU64,
    pub filtered: AtomicU64,
    pub clone_attempted: AtomicU64,
    pub clone_succeeded: AtomicU64,
    pub clone_failed: AtomicU64,
}

pub struct Downloader {
    pool: PgPool,
    index: SearchIndexClient,
    filter: QualityFilter,
    storage_roots: Vec<PathBuf>,
    workers: usize,
    clone_timeout: Duration,
    live: Arc<LiveCounters>,
}

impl Downloader {
    pub fn new(
        pool: PgPool,
        index: SearchIndexClient,
        storage_roots: Vec<PathBuf>,
        workers: usize,
        clone_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            index,
            filter: QualityFilter::new(),
            storage_roots,
            workers,
            clone_timeout,
            live: Arc::new(LiveCounters::default()),
        }
    }

    /// Shared counters updated as the run progresses, for a caller to read
    /// before `run()` resolves.
    pub fn live_counters(&self) -> Arc<LiveCounters> {
        Arc::clone(&self.live)
    }

    /// Pages through the search index,
    /// filtering and queuing every qualifying descriptor, then runs the
    /// clone scheduler once over the whole batch.
    pub async fn run(&self) -> Result<DownloaderStats, PipelineError> {
        let mut stats = DownloaderStats::default();
        let mut candidates = Vec::new();
        let mut from = 0u64;

        loop {
            let page = self.index.fetch_page(from, PAGE_SIZE).await?;
            if page.is_empty() {
                break;
            }

            for descriptor in page.iter() {
                stats.scanned += 1;
                self.live.scanned.fetch_add(1, Ordering::Relaxed);
                match self.filter.evaluate(descriptor) {
                    FilterOutcome::Pass { score } => {
                        stats.passed += 1;
                        self.live.passed.fetch_add(1, Ordering::Relaxed);
                        let id = repo_store::upsert_pending(&self.pool, descriptor, score).await?;
                        candidates.push(CloneCandidate {
                            repository_id: id,
                            descriptor: descriptor.clone(),
                            quality_score: score,
                        });
                    }
                    FilterOutcome::Reject { reason } => {
                        stats.filtered += 1;
                        self.live.filtered.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(full_name = %descriptor.full_name, reason, "descriptor filtered");
                        repo_store::mark_filtered(&self.pool, descriptor).await?;
                    }
                }
            }

            from += page.len() as u64;
        }

        let scheduler = CloneScheduler::new(
            self.pool.clone(),
            self.storage_roots.clone(),
            self.workers,
            self.clone_timeout,
        );
        stats.clone = scheduler.run(candidates, Arc::clone(&self.live)).await?;

        info!(
            scanned = stats.scanned,
            passed = stats.passed,
            filtered = stats.filtered,
            cloned = stats.clone.cloned,
            "downloader run complete"
        );
        Ok(stats)
    }
}
