//! Row types for the four relational-store tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloneStatus {
    Pending,
    Cloned,
    Failed,
    Filtered,
}

impl CloneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CloneStatus::Pending => "pending",
            CloneStatus::Cloned => "cloned",
            CloneStatus::Failed => "failed",
            CloneStatus::Filtered => "filtered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CloneStatus::Pending),
            "cloned" => Some(CloneStatus::Cloned),
            "failed" => Some(CloneStatus::Failed),
            "filtered" => Some(CloneStatus::Filtered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Repository record — downloader output.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: i64,
    pub display_name: String,
    pub full_name: String,
    pub url: String,
    pub language: String,
    pub description: String,
    pub stars: i64,
    pub forks: i64,
    pub topics: Vec<String>,
    pub discovered_at: DateTime<Utc>,
    pub quality_score: i32,
    pub clone_status: String,
    pub local_path: Option<String>,
    pub size_kb: i64,
    pub file_count: i32,
    pub lines_of_code: i64,
    pub last_cloned_at: Option<DateTime<Utc>>,
}

/// Processing job — one repository clone → one job.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: i64,
    pub clone_path: String,
    pub status: String,
    pub files_found: i32,
    pub files_processed: i32,
    pub worker_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Processed file — keyed by content hash.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub id: i64,
    pub job_id: i64,
    pub absolute_path: String,
    pub repo_relative_path: String,
    pub content: String,
    pub language: String,
    pub line_count: i32,
    pub byte_size: i64,
    pub content_hash: Vec<u8>,
    pub repo_name: String,
    pub quality_score: i32,
    pub processed_at: DateTime<Utc>,
}

/// Per-worker checkpoint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProcessingCheckpoint {
    pub worker_id: String,
    pub last_job_id: Option<i64>,
    pub cumulative_files_processed: i64,
    pub checkpoint_at: DateTime<Utc>,
}
