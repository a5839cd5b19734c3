//! Exercises per-worker checkpoint persistence: a
//! worker restarting after a crash must resume from its last saved
//! cumulative count rather than starting over.
//!
//! Requires a live Postgres instance reachable via `DATABASE_URL`. Skips
//! with a note when that's not configured.

use corpusforge::db::{self, checkpoint_store};
use sqlx::postgres::PgPool;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    match db::connect(&url).await {
        Ok(pool) => {
            db::bootstrap_schema(&pool).await.expect("bootstrap schema");
            Some(pool)
        }
        Err(e) => {
            println!("⚠️  Skipping: cannot reach DATABASE_URL ({})", e);
            None
        }
    }
}

#[tokio::test]
async fn checkpoint_round_trips_last_job_and_count() {
    let Some(pool) = test_pool().await else { return };

    let worker_id = format!("checkpoint-test-{}", uuid::Uuid::new_v4());

    assert!(checkpoint_store::load(&pool, &worker_id).await.unwrap().is_none());

    checkpoint_store::save(&pool, &worker_id, Some(42), 1_000).await.unwrap();
    let loaded = checkpoint_store::load(&pool, &worker_id).await.unwrap().expect("checkpoint should exist");
    assert_eq!(loaded.last_job_id, Some(42));
    assert_eq!(loaded.cumulative_files_processed, 1_000);

    // A later save for the same worker overwrites rather than accumulating
    // a second row (the table is keyed on worker_id).
    checkpoint_store::save(&pool, &worker_id, Some(99), 1_250).await.unwrap();
    let loaded = checkpoint_store::load(&pool, &worker_id).await.unwrap().unwrap();
    assert_eq!(loaded.last_job_id, Some(99));
    assert_eq!(loaded.cumulative_files_processed, 1_250);
}

#[tokio::test]
async fn distinct_workers_keep_independent_checkpoints() {
    let Some(pool) = test_pool().await else { return };

    let worker_a = format!("checkpoint-a-{}", uuid::Uuid::new_v4());
    let worker_b = format!("checkpoint-b-{}", uuid::Uuid::new_v4());

    checkpoint_store::save(&pool, &worker_a, Some(1), 10).await.unwrap();
    checkpoint_store::save(&pool, &worker_b, Some(2), 20).await.unwrap();

    let a = checkpoint_store::load(&pool, &worker_a).await.unwrap().unwrap();
    let b = checkpoint_store::load(&pool, &worker_b).await.unwrap().unwrap();

    assert_eq!(a.cumulative_files_processed, 10);
    assert_eq!(b.cumulative_files_processed, 20);
}
