use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use corpusforge::config::PipelineConfig;
use corpusforge::crawler::Crawler;
use corpusforge::search_index::SearchIndexClient;

const STATUS_LINE_INTERVAL: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    let config = PipelineConfig::from_env_and_args(2);
    corpusforge::config::init_tracing(&config.log_level);

    info!("starting crawler");

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build http client");
            std::process::exit(1);
        }
    };

    let index = SearchIndexClient::new(http.clone(), config.es_url.clone());
    let crawler = Crawler::new(http, index);

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("shutdown signal received, finishing in-flight crawl units");
        shutdown_cancel.cancel();
    });

    spawn_status_line(crawler.live_attempted());

    tokio::select! {
        result = crawler.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        attempted = stats.units_attempted,
                        failed = stats.units_failed,
                        discovered = stats.repos_discovered,
                        "crawl run finished"
                    );
                    std::process::exit(0);
                }
                Err(e) => {
                    error!(error = %e, "crawl run failed");
                    std::process::exit(1);
                }
            }
        }
        _ = cancel.cancelled() => {
            info!("crawler interrupted by signal");
            std::process::exit(130);
        }
    }
}

fn spawn_status_line(units_attempted: Arc<AtomicU64>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(STATUS_LINE_INTERVAL).await;
            println!("crawler: {} units attempted so far", units_attempted.load(Ordering::Relaxed));
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
