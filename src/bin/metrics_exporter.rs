use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use corpusforge::config::PipelineConfig;
use corpusforge::db;
use corpusforge::metrics::MetricsState;
use corpusforge::metrics::collector::MetricsSnapshot;

const STATUS_LINE_INTERVAL: Duration = Duration::from_secs(120);
const DEFAULT_BIND_PORT: u16 = 9090;

#[tokio::main]
async fn main() {
    let config = PipelineConfig::from_env_and_args(1);
    corpusforge::config::init_tracing(&config.log_level);

    info!("starting metrics exporter");

    let pool = match db::connect(&config.db_url).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "cannot connect to database");
            std::process::exit(1);
        }
    };

    let bind_addr = std::env::var("METRICS_BIND_ADDR")
        .unwrap_or_else(|_| format!("0.0.0.0:{}", DEFAULT_BIND_PORT));

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("shutdown signal received");
        shutdown_cancel.cancel();
    });
    let interrupted = cancel.clone();

    let state = Arc::new(MetricsState {
        pool,
        snapshot: RwLock::new(MetricsSnapshot::default()),
    });
    spawn_status_line(Arc::clone(&state));

    match corpusforge::metrics::run(&bind_addr, cancel, state).await {
        Ok(()) => {
            if interrupted.is_cancelled() {
                std::process::exit(130);
            }
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "metrics exporter failed");
            std::process::exit(1);
        }
    }
}

fn spawn_status_line(state: Arc<MetricsState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(STATUS_LINE_INTERVAL).await;
            let snapshot = state.snapshot.read().await;
            println!(
                "metrics exporter: serving {} files tracked, {:.2} files/min",
                snapshot.files_total, snapshot.files_per_minute
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
