//! Exercises the atomic claim predicate in `db::job_store::try_claim`:
//! concurrent workers racing on the same job must never both win.
//!
//! Requires a live Postgres instance reachable via `DATABASE_URL`. Skips
//! with a note when that's not configured, matching the rest of this
//! crate's live-dependency tests.

use std::sync::Arc;

use corpusforge::db::{self, job_store};
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
async fn concurrent_claims_pick_exactly_one_winner() {
    let Some(pool) = test_pool().await else { return };

    let clone_path = format!("/tmp/job-claim-race-{}", uuid::Uuid::new_v4());
    job_store::insert_pending_if_absent(&pool, &clone_path)
        .await
        .expect("insert pending job");

    let claimable = job_store::fetch_claimable(&pool, 50)
        .await
        .expect("fetch claimable");
    let job = claimable
        .into_iter()
        .find(|j| j.clone_path == clone_path)
        .expect("job should be claimable");

    let pool = Arc::new(pool);
    let mut handles = Vec::new();
    for worker_idx in 0..8 {
        let pool = Arc::clone(&pool);
        let job_id = job.id;
        handles.push(tokio::spawn(async move {
            job_store::try_claim(&pool, job_id, &format!("racer-{}", worker_idx))
                .await
                .expect("try_claim should not error")
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.expect("task join") {
            wins += 1;
        }
    }

    assert_eq!(wins, 1, "exactly one of the racing workers should win the claim");

    // The job is now 'processing'; it shouldn't be claimable again until
    // it either fails or goes stale.
    let still_claimable = job_store::fetch_claimable(&pool, 50)
        .await
        .expect("fetch claimable after claim");
    assert!(!still_claimable.iter().any(|j| j.id == job.id));
}

#[tokio::test]
async fn failed_job_becomes_reclaimable() {
    let Some(pool) = test_pool().await else { return };

    let clone_path = format!("/tmp/job-claim-retry-{}", uuid::Uuid::new_v4());
    job_store::insert_pending_if_absent(&pool, &clone_path)
        .await
        .expect("insert pending job");

    let claimable = job_store::fetch_claimable(&pool, 50).await.expect("fetch claimable");
    let job = claimable.into_iter().find(|j| j.clone_path == clone_path).unwrap();

    assert!(job_store::try_claim(&pool, job.id, "worker-a").await.unwrap());
    job_store::mark_failed(&pool, job.id, "disk full").await.unwrap();

    let reclaimable = job_store::fetch_claimable(&pool, 50).await.unwrap();
    assert!(reclaimable.iter().any(|j| j.id == job.id), "failed job should be claimable again");

    assert!(job_store::try_claim(&pool, job.id, "worker-b").await.unwrap());
}
