//! HTTP surface for the Metrics Exporter: `/metrics` as text, `/health` as
//! a cheap DB ping, `/summary` as an aggregate JSON snapshot.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPool;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::collector::{render_text, MetricsSnapshot};

pub struct MetricsState {
    pub pool: PgPool,
    pub snapshot: RwLock<MetricsSnapshot>,
}

pub fn build_router(state: Arc<MetricsState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/summary", get(summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "status": "healthy" }))),
        Err(e) => {
            error!(error = %e, "health check db ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unhealthy", "error": e.to_string() })),
            )
        }
    }
}

async fn metrics_text(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    (StatusCode::OK, render_text(&snapshot))
}

async fn summary(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(serde_json::to_value(&*snapshot).unwrap_or_default())
}

pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
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

    info!("metrics exporter shutting down");
}
