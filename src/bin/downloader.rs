use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use corpusforge::config::PipelineConfig;
use corpusforge::db;
use corpusforge::downloader::{Downloader, LiveCounters};
use corpusforge::search_index::SearchIndexClient;

const STATUS_LINE_INTERVAL: Duration = Duration::from_secs(120);
const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() {
    let config = PipelineConfig::from_env_and_args(3);
    corpusforge::config::init_tracing(&config.log_level);

    info!("starting downloader");

    let pool = match db::connect(&config.db_url).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "cannot connect to database");
            std::process::exit(1);
        }
    };
    if let Err(e) = db::bootstrap_schema(&pool).await {
        error!(error = %e, "cannot bootstrap schema");
        std::process::exit(1);
    }

    for root in &config.storage_roots {
        if let Err(e) = std::fs::create_dir_all(root) {
            error!(error = %e, root = %root.display(), "storage root does not exist and cannot be created");
            std::process::exit(1);
        }
    }

    let http = match reqwest::Client::builder().timeout(Duration::from_secs(30)).build() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build http client");
            std::process::exit(1);
        }
    };
    let index = SearchIndexClient::new(http, config.es_url.clone());

    let downloader = Downloader::new(
        pool,
        index,
        config.storage_roots.clone(),
        config.workers,
        DEFAULT_CLONE_TIMEOUT,
    );

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("shutdown signal received, finishing in-flight clones");
        shutdown_cancel.cancel();
    });

    spawn_status_line(downloader.live_counters());

    tokio::select! {
        result = downloader.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        scanned = stats.scanned,
                        passed = stats.passed,
                        filtered = stats.filtered,
                        cloned = stats.clone.cloned,
                        failed = stats.clone.failed,
                        "downloader run finished"
                    );
                    std::process::exit(0);
                }
                Err(e) => {
                    error!(error = %e, "downloader run failed");
                    std::process::exit(1);
                }
            }
        }
        _ = cancel.cancelled() => {
            info!("downloader interrupted by signal");
            std::process::exit(130);
        }
    }
}

fn spawn_status_line(live: Arc<LiveCounters>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(STATUS_LINE_INTERVAL).await;
            println!(
                "downloader: {} scanned, {} passed, {} cloned, {} clone failures",
                live.scanned.load(Ordering::Relaxed),
                live.passed.load(Ordering::Relaxed),
                live.clone_succeeded.load(Ordering::Relaxed),
                live.clone_failed.load(Ordering::Relaxed),
            );
        }
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
