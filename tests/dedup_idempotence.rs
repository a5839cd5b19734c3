//! Exercises content-hash deduplication across the in-memory `DedupSet`
//! and the `processed_files` table it's bootstrapped from:
//! re-processing the same bytes must never produce a second row.
//!
//! Requires a live Postgres instance reachable via `DATABASE_URL`. Skips
//! with a note when that's not configured.

use corpusforge::db::{self, file_store};
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
    corpusforge::db::job_store::insert_pending_if_absent(pool, clone_path)
        .await
        .unwrap();
    let jobs = corpusforge::db::job_store::fetch_claimable(pool, 200).await.unwrap();
    jobs.into_iter().find(|j| j.clone_path == clone_path).unwrap().id
}

#[tokio::test]
async fn identical_content_across_repos_is_deduplicated_in_memory() {
    let Some(pool) = test_pool().await else { return };

    let job_id = insert_dummy_job(&pool, &format!("/tmp/dedup-a-{}", uuid::Uuid::new_v4())).await;

    let shared_license = "MIT License\n\nCopyright (c) 2024\n";
    let dedup = DedupSet::new();

    let first = pending_file(job_id, shared_license, "repo-one");
    assert!(dedup.insert(first.content_hash), "first sighting should insert");

    let second = pending_file(job_id, shared_license, "repo-two");
    assert_eq!(first.content_hash, second.content_hash, "identical bytes hash identically");
    assert!(!dedup.insert(second.content_hash), "second sighting must be rejected");

    file_store::insert_batch(&pool, &[first]).await.expect("insert unique batch");
    assert_eq!(dedup.len(), 1);
}

#[tokio::test]
async fn loading_known_hashes_prevents_reprocessing_after_restart() {
    let Some(pool) = test_pool().await else { return };

    let job_id = insert_dummy_job(&pool, &format!("/tmp/dedup-b-{}", uuid::Uuid::new_v4())).await;
    let content = format!("fn marker_{}() {{}}\n", uuid::Uuid::new_v4().simple());
    let file = pending_file(job_id, &content, "repo-restart");

    file_store::insert_batch(&pool, &[file.clone()]).await.unwrap();

    // Simulate a fresh worker process rebuilding its dedup set from storage.
    let known = file_store::load_known_hashes(&pool).await.unwrap();
    let rebuilt = DedupSet::from_known(known);

    assert!(
        !rebuilt.insert(file.content_hash),
        "a hash already on disk must be rejected by a freshly rebuilt dedup set"
    );
}
