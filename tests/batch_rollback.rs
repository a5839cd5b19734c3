//! Exercises whole-batch rollback on `processed_files` insert failure: a batch containing one row that violates the
//! content-hash uniqueness constraint must leave none of its rows behind,
//! including the ones that would otherwise have succeeded.
//!
//! Requires a live Postgres instance reachable via `DATABASE_URL`. Skips
//! with a note when that's not configured.

use corpusforge::db::{self, file_store, job_store};
use corpusforge::db::file_store::PendingFile;
use corpusforge::hashing::content_hash;
use corpusforge::processor::dedup::DedupSet;
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

fn pending_file(job_id: i64, content: &str, repo: &str) -> PendingFile {
    let bytes = content.as_bytes();
    PendingFile {
        job_id,
        absolute_path: format!("/tmp/{}/file.rs", repo),
        repo_relative_path: "file.rs".to_string(),
        content: content.to_string(),
        language: "rust".to_string(),
        line_count: content.lines().count() as i32,
        byte_size: bytes.len() as i64,
        content_hash: content_hash(bytes),
        repo_name: repo.to_string(),
        quality_score: 50,
    }
}

async fn insert_dummy_job(pool: &PgPool, clone_path: &str) -> i64 {
    job_store::insert_pending_if_absent(pool, clone_path).await.unwrap();
    let jobs = job_store::fetch_claimable(pool, 200).await.unwrap();
    jobs.into_iter().find(|j| j.clone_path == clone_path).unwrap().id
}

#[tokio::test]
async fn batch_with_one_duplicate_hash_inserts_nothing() {
    let Some(pool) = test_pool().await else { return };

    let job_id = insert_dummy_job(&pool, &format!("/tmp/rollback-{}", uuid::Uuid::new_v4())).await;

    let already_stored = pending_file(job_id, "fn already_stored() {}\n", "repo-seed");
    file_store::insert_batch(&pool, &[already_stored.clone()]).await.expect("seed row");

    let marker = uuid::Uuid::new_v4().simple().to_string();
    let fresh_one = pending_file(job_id, &format!("fn fresh_{}_one() {{}}\n", marker), "repo-batch");
    let fresh_two = pending_file(job_id, &format!("fn fresh_{}_two() {{}}\n", marker), "repo-batch");
    // Same bytes as `already_stored`, so it carries the same content_hash
    // and collides with the unique index once the transaction tries to
    // insert it.
    let colliding = pending_file(job_id, "fn already_stored() {}\n", "repo-batch");

    let batch = vec![fresh_one.clone(), colliding, fresh_two.clone()];
    let result = file_store::insert_batch(&pool, &batch).await;
    assert!(result.is_err(), "batch containing a hash collision should fail");

    let known = file_store::load_known_hashes(&pool).await.unwrap();
    assert!(
        !known.contains(&fresh_one.content_hash),
        "rows before the colliding one must be rolled back, not partially committed"
    );
    assert!(
        !known.contains(&fresh_two.content_hash),
        "rows after the colliding one must also be rolled back"
    );
    assert!(known.contains(&already_stored.content_hash), "the original seed row must survive untouched");
}

#[tokio::test]
async fn dedup_set_rollback_mirrors_database_rollback() {
    let Some(pool) = test_pool().await else { return };

    let job_id = insert_dummy_job(&pool, &format!("/tmp/rollback-dedup-{}", uuid::Uuid::new_v4())).await;

    let seed = pending_file(job_id, "const SEED: u8 = 1;\n", "repo-seed-two");
    file_store::insert_batch(&pool, &[seed.clone()]).await.unwrap();

    let dedup = DedupSet::new();
    let marker = uuid::Uuid::new_v4().simple().to_string();
    let fresh = pending_file(job_id, &format!("const FRESH_{}: u8 = 1;\n", marker), "repo-batch-two");
    let colliding = pending_file(job_id, "const SEED: u8 = 1;\n", "repo-batch-two");

    // Mirrors job_worker's flush_batch: speculatively insert into the
    // in-memory set before the database write is attempted.
    assert!(dedup.insert(fresh.content_hash));
    assert!(dedup.insert(colliding.content_hash));

    let batch = vec![fresh.clone(), colliding.clone()];
    if file_store::insert_batch(&pool, &batch).await.is_err() {
        dedup.remove(&fresh.content_hash);
        dedup.remove(&colliding.content_hash);
    }

    assert!(
        dedup.insert(fresh.content_hash),
        "a rolled-back hash must be re-insertable on the next attempt"
    );
}
