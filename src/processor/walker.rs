//! Recursive repository walk: skips hidden
//! directories, dependency directories, and binary blobs; classifies the
//! rest by extension.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const SKIPPED_DIR_NAMES: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "dist",
    "build",
    "out",
    ".git",
    ".svn",
    ".hg",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "pdf", "zip", "tar", "gz", "bz2", "xz",
    "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "wasm", "woff", "woff2",
    "ttf", "eot", "mp3", "mp4", "wav", "avi", "mov", "db", "sqlite", "lock",
];

const MIN_FILE_BYTES: u64 = 100;
const MAX_FILE_BYTES: u64 = 1_000_000;

/// Extension -> language name, used both for code-file recognition and for the processed-file `language` column.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext.to_lowercase().as_str() {
        "rs" => "Rust",
        "go" => "Go",
        "py" => "Python",
        "ts" | "tsx" => "TypeScript",
        "js" | "jsx" | "mjs" | "cjs" => "JavaScript",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "swift" => "Swift",
        "c" | "h" => "C",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "C++",
        "cs" => "C#",
        "rb" => "Ruby",
        "php" => "PHP",
        "scala" => "Scala",
        "hs" => "Haskell",
        "ex" | "exs" => "Elixir",
        "zig" => "Zig",
        "clj" | "cljs" => "Clojure",
        "lua" => "Lua",
        "ml" | "mli" => "OCaml",
        _ => return None,
    })
}

pub fn is_recognized_code_extension(ext: &str) -> bool {
    language_for_extension(ext).is_some()
}

fn is_binary_extension(ext: &str) -> bool {
    BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIR_NAMES.contains(&name)
}

/// A file that passed the extension/size gate and is ready for content
/// hashing and scoring.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub absolute_path: PathBuf,
    pub repo_relative_path: String,
    pub language: &'static str,
    pub byte_size: u64,
}

/// Walks `repo_root`, yielding every file that passes the extension,
/// binary, and size filters.
pub fn walk_candidates(repo_root: &Path) -> Vec<CandidateFile> {
    let mut out = Vec::new();

    let walker = WalkDir::new(repo_root).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            return entry.depth() == 0 || !is_skipped_dir(&name);
        }
        true
    });

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if is_binary_extension(ext) {
            continue;
        }
        let Some(language) = language_for_extension(ext) else {
            continue;
        };

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let size = metadata.len();
        if size < MIN_FILE_BYTES || size > MAX_FILE_BYTES {
            continue;
        }

        let relative = path.strip_prefix(repo_root).unwrap_or(path).to_string_lossy().to_string();
        out.push(CandidateFile {
            absolute_path: path.to_path_buf(),
            repo_relative_path: relative,
            language,
            byte_size: size,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_dependency_and_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/leftpad.js"), "x".repeat(200)).unwrap();
        fs::write(dir.path().join("main.rs"), "x".repeat(200)).unwrap();

        let found = walk_candidates(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].repo_relative_path.ends_with("main.rs"));
    }

    #[test]
    fn filters_by_size_bounds() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tiny.rs"), "x").unwrap();
        fs::write(dir.path().join("ok.rs"), "x".repeat(200)).unwrap();

        let found = walk_candidates(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].repo_relative_path.ends_with("ok.rs"));
    }

    #[test]
    fn language_lookup_covers_common_extensions() {
        assert_eq!(language_for_extension("rs"), Some("Rust"));
        assert_eq!(language_for_extension("unknownext"), None);
    }
}
