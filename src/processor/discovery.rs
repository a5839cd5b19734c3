//! Discovery step: walk the top level of the repos directory
//! and register every valid repository as a pending job.

use std::fs;
use std::path::Path;

use sqlx::postgres::PgPool;
use tracing::info;

use crate::db::job_store;
use crate::error::PipelineError;

use super::walker::is_recognized_code_extension;

const MIN_TOP_LEVEL_CODE_FILES: usize = 3;
const TOP_LEVEL_DEPTH: usize = 2;

/// A directory counts as a repository iff it has a `.git` subdirectory or
/// at least three recognized code files within its top two levels.
pub fn is_valid_repository(path: &Path) -> bool {
    if path.join(".git").is_dir() {
        return true;
    }
    count_code_files(path, TOP_LEVEL_DEPTH) >= MIN_TOP_LEVEL_CODE_FILES
}

fn count_code_files(dir: &Path, depth_remaining: usize) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            if path
                .extension()
                .and_then(|e| e.to_str())
                .map(is_recognized_code_extension)
                .unwrap_or(false)
            {
                count += 1;
            }
        } else if path.is_dir() && depth_remaining > 1 {
            count += count_code_files(&path, depth_remaining - 1);
        }
    }
    count
}

/// Registers a pending job for every valid repository found under any of
/// `storage_roots` that isn't already tracked. The Downloader
/// lays clones out as `<root>/<language>/<owner>/<name>`, so "the
/// top level of the repos directory" is applied at that third level rather
/// than directly under the root.
pub async fn discover(pool: &PgPool, storage_roots: &[std::path::PathBuf]) -> Result<u64, PipelineError> {
    let mut discovered = 0u64;
    for root in storage_roots {
        discovered += discover_under_root(pool, root).await?;
    }
    info!(discovered, "repository discovery complete");
    Ok(discovered)
}

async fn discover_under_root(pool: &PgPool, root: &Path) -> Result<u64, PipelineError> {
    let mut discovered = 0u64;

    let Ok(language_dirs) = fs::read_dir(root) else {
        return Ok(0);
    };

    for language_entry in language_dirs.flatten() {
        let language_path = language_entry.path();
        if !language_path.is_dir() {
            continue;
        }
        let Ok(owner_dirs) = fs::read_dir(&language_path) else {
            continue;
        };

        for owner_entry in owner_dirs.flatten() {
            let owner_path = owner_entry.path();
            if !owner_path.is_dir() {
                continue;
            }
            let Ok(repo_dirs) = fs::read_dir(&owner_path) else {
                continue;
            };

            for repo_entry in repo_dirs.flatten() {
                let repo_path = repo_entry.path();
                if !repo_path.is_dir() || !is_valid_repository(&repo_path) {
                    continue;
                }

                let clone_path = repo_path.to_string_lossy().to_string();
                if job_store::exists_for_clone_path(pool, &clone_path).await? {
                    continue;
                }

                job_store::insert_pending_if_absent(pool, &clone_path).await?;
                discovered += 1;
            }
        }
    }

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self as stdfs, File};

    #[test]
    fn git_directory_alone_qualifies() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::create_dir(dir.path().join(".git")).unwrap();
        assert!(is_valid_repository(dir.path()));
    }

    #[test]
    fn three_code_files_qualify_without_git() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.rs")).unwrap();
        File::create(dir.path().join("b.rs")).unwrap();
        File::create(dir.path().join("c.rs")).unwrap();
        assert!(is_valid_repository(dir.path()));
    }

    #[test]
    fn two_code_files_do_not_qualify() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.rs")).unwrap();
        File::create(dir.path().join("b.rs")).unwrap();
        assert!(!is_valid_repository(dir.path()));
    }
}
