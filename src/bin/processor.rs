use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use corpusforge::config::PipelineConfig;
use corpusforge::db;
use corpusforge::processor::LiveCounters;

const STATUS_LINE_INTERVAL: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    let config = PipelineConfig::from_env_and_args(4);
    corpusforge::config::init_tracing(&config.log_level);

    info!("starting processor");

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

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("shutdown signal received, workers will flush checkpoints and exit");
        shutdown_cancel.cancel();
    });

    let live = Arc::new(LiveCounters::default());
    spawn_status_line(Arc::clone(&live));

    let worker_id_prefix = hostname_or_pid();
    let interrupted = cancel.clone();

    let result = corpusforge::processor::run(
        pool,
        &config.storage_roots,
        config.workers,
        &worker_id_prefix,
        cancel.clone(),
        live,
    )
    .await;

    match result {
        Ok(stats) => {
            let jobs_completed: u64 = stats.iter().map(|s| s.jobs_completed).sum();
            let jobs_failed: u64 = stats.iter().map(|s| s.jobs_failed).sum();
            let files_processed: u64 = stats.iter().map(|s| s.files_processed).sum();
            info!(jobs_completed, jobs_failed, files_processed, "processor run finished");
            if interrupted.is_cancelled() {
                std::process::exit(130);
            }
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "processor run failed");
            std::process::exit(1);
        }
    }
}

fn hostname_or_pid() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| format!("pid-{}", std::process::id()))
}

fn spawn_status_line(live: Arc<LiveCounters>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(STATUS_LINE_INTERVAL).await;
            println!(
                "processor: {} jobs completed, {} failed, {} files processed",
                live.jobs_completed.load(Ordering::Relaxed),
                live.jobs_failed.load(Ordering::Relaxed),
                live.files_processed.load(Ordering::Relaxed),
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
