//! Storage-root abstraction for the Downloader's clone destinations. A
//! small capability trait — `available_bytes()` / `write_root()` — with a
//! local-directory implementation.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Below this much free space on a root, the Downloader fails over to the
/// next configured root.
pub const LOW_SPACE_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024 * 1024; // 100 GB

pub trait StorageRoot: Send + Sync {
    fn available_bytes(&self) -> Result<u64, PipelineError>;
    fn write_root(&self) -> &Path;
}

pub struct LocalStorageRoot {
    root: PathBuf,
}

impl LocalStorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StorageRoot for LocalStorageRoot {
    fn available_bytes(&self) -> Result<u64, PipelineError> {
        fs2::available_space(&self.root).map_err(|e| {
            PipelineError::permanent_run(format!(
                "cannot stat storage root {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    fn write_root(&self) -> &Path {
        &self.root
    }
}

/// Picks the first configured root with enough free space. If none qualify,
/// returns `None` so the caller can pause until space returns, rather than
/// dropping the job.
pub fn select_write_root<'a>(roots: &'a [Box<dyn StorageRoot>]) -> Option<&'a dyn StorageRoot> {
    roots
        .iter()
        .find(|r| {
            r.available_bytes()
                .map(|b| b >= LOW_SPACE_THRESHOLD_BYTES)
                .unwrap_or(false)
        })
        .map(|r| r.as_ref())
}

/// Clone destination path: `<storage-root>/<language>/<owner>/<name>`.
pub fn clone_path(root: &Path, language: &str, owner: &str, name: &str) -> PathBuf {
    let language = if language.trim().is_empty() {
        "Unknown"
    } else {
        language
    };
    root.join(language).join(owner).join(name)
}
