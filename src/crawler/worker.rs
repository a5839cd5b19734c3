//! Bounded worker pool driving the term x page matrix against the upstream
//! search engine, then the repository landing pages it discovers. 429
//! handling follows `Retry-After` with the crate-level `retry` module's
//! capped-exponential backoff.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::rate_limiter::RateLimiter;
use crate::retry::exponential_delay;
use crate::search_index::descriptor::RepositoryDescriptor;
use crate::search_index::SearchIndexClient;

use super::engine::{parse_repo_page, parse_search_results};
use super::terms::{search_terms, DEFAULT_PAGE_DEPTH};

const CONCURRENCY: usize = 2;
const GLOBAL_REQUEST_INTERVAL: Duration = Duration::from_secs(3);
const MAX_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_BACKOFF_SECS: u64 = 300;
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const SEARCH_BASE_URL: &str = "https://github.com/search";

/// Tally printed at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlStats {
    pub units_attempted: u64,
    pub units_failed: u64,
    pub repos_discovered: u64,
    pub repos_upserted: u64,
}

pub struct Crawler {
    http: reqwest::Client,
    index: SearchIndexClient,
    limiter: Arc<RateLimiter>,
    live_attempted: Arc<AtomicU64>,
}

impl Crawler {
    pub fn new(http: reqwest::Client, index: SearchIndexClient) -> Self {
        Self {
            http,
            index,
            limiter: Arc::new(RateLimiter::new(GLOBAL_REQUEST_INTERVAL)),
            live_attempted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter incremented as each (term, page) unit starts, for a
    /// caller to read while `run()` is still in flight.
    pub fn live_attempted(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.live_attempted)
    }

    /// Runs the full term x page matrix to completion.
    pub async fn run(&self) -> Result<CrawlStats, crate::error::PipelineError> {
        self.index.ensure_index().await?;

        let mut units = Vec::new();
        for term in search_terms() {
            for page in 1..=DEFAULT_PAGE_DEPTH {
                units.push((term.clone(), page));
            }
        }

        let stats = Arc::new(Mutex::new(CrawlStats::default()));
        let seen_hrefs: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        stream::iter(units)
            .for_each_concurrent(CONCURRENCY, |(term, page)| {
                let stats = Arc::clone(&stats);
                let seen_hrefs = Arc::clone(&seen_hrefs);
                async move {
                    stats.lock().await.units_attempted += 1;
                    self.live_attempted.fetch_add(1, Ordering::Relaxed);
                    match self.process_unit(&term, page, &seen_hrefs).await {
                        Ok(upserted) => {
                            let mut s = stats.lock().await;
                            s.repos_discovered += upserted as u64;
                            s.repos_upserted += upserted as u64;
                        }
                        Err(e) => {
                            warn!(term = %term, page, error = %e, "crawl unit dropped");
                            stats.lock().await.units_failed += 1;
                        }
                    }
                }
            })
            .await;

        let final_stats = *stats.lock().await;
        info!(
            attempted = final_stats.units_attempted,
            failed = final_stats.units_failed,
            discovered = final_stats.repos_discovered,
            "crawl run complete"
        );
        Ok(final_stats)
    }

    /// One (term, page) unit: fetch the listing page, then enrich and
    /// upsert every newly-seen repository it names. Returns how many
    /// descriptors were upserted.
    async fn process_unit(
        &self,
        term: &str,
        page: u32,
        seen_hrefs: &Arc<Mutex<HashSet<String>>>,
    ) -> Result<usize, crate::error::PipelineError> {
        let url = format!(
            "{}?q={}&type=repositories&p={}",
            SEARCH_BASE_URL,
            percent_encoding::utf8_percent_encode(term, percent_encoding::NON_ALPHANUMERIC),
            page
        );

        let body = self.get_with_retry(&url).await?;
        let hits = parse_search_results(&body);

        let mut fresh = Vec::new();
        {
            let mut seen = seen_hrefs.lock().await;
            for hit in hits {
                if seen.insert(hit.url.clone()) {
                    fresh.push(hit);
                }
            }
        }

        let mut upserted = 0usize;
        for hit in fresh {
            match self.enrich_and_upsert(&hit).await {
                Ok(()) => upserted += 1,
                Err(e) => warn!(full_name = %hit.full_name, error = %e, "repo enrichment dropped"),
            }
        }
        Ok(upserted)
    }

    async fn enrich_and_upsert(
        &self,
        hit: &super::engine::SearchHit,
    ) -> Result<(), crate::error::PipelineError> {
        let body = self.get_with_retry(&hit.url).await?;
        let facts = parse_repo_page(&body)?;

        let display_name = hit
            .full_name
            .split_once('/')
            .map(|(_, repo)| repo.to_string())
            .unwrap_or_else(|| hit.full_name.clone());

        let descriptor = RepositoryDescriptor {
            display_name,
            full_name: hit.full_name.clone(),
            url: hit.url.clone(),
            language: facts.language,
            description: facts.description,
            stars: facts.stars,
            forks: facts.forks,
            topics: facts.topics,
            discovered_at: Utc::now(),
        };

        self.index.upsert(&descriptor).await
    }

    /// Rate-limited GET with 429-aware retry. Non-429 errors propagate immediately and the caller
    /// drops the unit; only throttling is retried here.
    async fn get_with_retry(&self, url: &str) -> Result<String, crate::error::PipelineError> {
        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;

            let resp = self
                .http
                .get(url)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "text/html,application/xhtml+xml")
                .send()
                .await
                .map_err(crate::error::PipelineError::from)?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                if attempt > MAX_RETRY_ATTEMPTS {
                    return Err(crate::error::PipelineError::transient(format!(
                        "rate limited after {} attempts: {}",
                        attempt - 1,
                        url
                    )));
                }

                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

                let backoff = exponential_delay(attempt, Duration::from_secs(MAX_BACKOFF_SECS));
                let sleep_for = retry_after.max(backoff.as_secs());
                warn!(url, attempt, sleep_for, "rate limited, backing off");
                tokio::time::sleep(Duration::from_secs(sleep_for)).await;
                continue;
            }

            if !resp.status().is_success() {
                return Err(crate::error::PipelineError::transient(format!(
                    "unexpected status {} for {}",
                    resp.status(),
                    url
                )));
            }

            return resp.text().await.map_err(crate::error::PipelineError::from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max_backoff_secs() {
        let cap = Duration::from_secs(MAX_BACKOFF_SECS);
        for attempt in 1..=10u32 {
            assert!(exponential_delay(attempt, cap) <= cap);
        }
    }
}
