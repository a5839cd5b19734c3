//! Metrics Exporter component: read-only, polls the relational
//! store every 15s and serves the cached snapshot over HTTP.

pub mod collector;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::PipelineError;

pub use http::MetricsState;

const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Binds `bind_addr`, starts the 15s poller, and serves until `cancel`
/// fires or a signal arrives — whichever comes first. `state` is shared
/// with the caller so it can read live totals (e.g. for a status line)
/// while this future is still running.
pub async fn run(
    bind_addr: &str,
    cancel: CancellationToken,
    state: Arc<MetricsState>,
) -> Result<(), PipelineError> {
    let poll_state = Arc::clone(&state);
    let poll_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            match collector::collect(&poll_state.pool).await {
                Ok(snapshot) => {
                    *poll_state.snapshot.write().await = snapshot;
                }
                Err(e) => warn!(error = %e, "metrics poll failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = poll_cancel.cancelled() => break,
            }
        }
    });

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| PipelineError::permanent_run(format!("cannot bind {}: {}", bind_addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = http::shutdown_signal() => {}
                _ = cancel.cancelled() => {}
            }
        })
        .await
        .map_err(|e| {
            error!(error = %e, "metrics server exited with error");
            PipelineError::permanent_run(format!("metrics server error: {}", e))
        })
}
