//! Harmonized configuration shared by all four binaries.
//!
//! No flags crate: each binary scans `std::env::args()` by hand, then
//! falls back to environment variables, then to hardcoded defaults.

use std::path::PathBuf;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_ELASTICSEARCH_URL: &str = "ELASTICSEARCH_URL";
pub const ENV_GITHUB_TOKENS: &str = "GITHUB_TOKENS";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// Reads an environment variable, preferring the file-mounted secret
/// (`<VAR>_FILE`) over the raw value
pub fn env_or_secret_file(var: &str) -> Option<String> {
    let file_var = format!("{}_FILE", var);
    if let Ok(path) = std::env::var(&file_var) {
        match std::fs::read_to_string(&path) {
            Ok(contents) => return Some(contents.trim().to_string()),
            Err(e) => {
                tracing::warn!("failed to read {} at {}: {}", file_var, path, e);
            }
        }
    }
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Comma-separated list support for `GITHUB_TOKEN[S]`.
pub fn github_tokens() -> Vec<String> {
    let raw = env_or_secret_file(ENV_GITHUB_TOKENS).or_else(|| env_or_secret_file(ENV_GITHUB_TOKEN));
    raw.map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub storage_roots: Vec<PathBuf>,
    pub workers: usize,
    pub rate_limit_per_sec: f64,
    pub db_url: String,
    pub es_url: String,
    pub log_level: String,
}

fn flag_values(args: &[String], flag: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter().peekable();
    while let Some(a) = iter.next() {
        if a == flag {
            if let Some(v) = iter.next() {
                out.push(v.clone());
            }
        } else if let Some(rest) = a.strip_prefix(&format!("{}=", flag)) {
            out.push(rest.to_string());
        }
    }
    out
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    flag_values(args, flag).into_iter().next_back()
}

impl PipelineConfig {
    /// Parses harmonized flags from `std::env::args()`, falling back to env
    /// vars and then defaults. Every binary's `main()` calls this once.
    pub fn from_env_and_args(default_workers: usize) -> Self {
        let args: Vec<String> = std::env::args().collect();

        let mut storage_roots: Vec<PathBuf> = flag_values(&args, "--storage-root")
            .into_iter()
            .map(PathBuf::from)
            .collect();
        if storage_roots.is_empty() {
            if let Ok(v) = std::env::var("STORAGE_ROOTS") {
                storage_roots = v.split(',').map(PathBuf::from).collect();
            }
        }
        if storage_roots.is_empty() {
            storage_roots.push(
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".corpusforge")
                    .join("storage"),
            );
        }

        let workers = flag_value(&args, "--workers")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("WORKERS").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(default_workers);

        let rate_limit_per_sec = flag_value(&args, "--rate-limit-per-sec")
            .and_then(|v| v.parse().ok())
            .or_else(|| {
                std::env::var("RATE_LIMIT_PER_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(1.0);

        let db_url = flag_value(&args, "--db-url")
            .or_else(|| env_or_secret_file(ENV_DATABASE_URL))
            .unwrap_or_else(|| "postgres://localhost/corpusforge".to_string());

        let es_url = flag_value(&args, "--es-url")
            .or_else(|| env_or_secret_file(ENV_ELASTICSEARCH_URL))
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let log_level = flag_value(&args, "--log-level")
            .or_else(|| std::env::var("LOG_LEVEL").ok())
            .unwrap_or_else(|| "info".to_string());

        Self {
            storage_roots,
            workers,
            rate_limit_per_sec,
            db_url,
            es_url,
            log_level,
        }
    }
}

/// Initializes `tracing`: `RUST_LOG` (or `--log-level`) drives an
/// `EnvFilter`, default `info`.
pub fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_value_handles_both_forms() {
        let args = vec![
            "bin".to_string(),
            "--workers".to_string(),
            "7".to_string(),
            "--db-url=postgres://x".to_string(),
        ];
        assert_eq!(flag_value(&args, "--workers"), Some("7".to_string()));
        assert_eq!(flag_value(&args, "--db-url"), Some("postgres://x".to_string()));
        assert_eq!(flag_value(&args, "--missing"), None);
    }

    #[test]
    fn flag_values_collects_repeated_storage_roots() {
        let args = vec![
            "bin".to_string(),
            "--storage-root".to_string(),
            "/a".to_string(),
            "--storage-root".to_string(),
            "/b".to_string(),
        ];
        assert_eq!(flag_values(&args, "--storage-root"), vec!["/a", "/b"]);
    }

    #[test]
    fn github_tokens_splits_on_comma() {
        std::env::set_var("GITHUB_TOKENS", "a, b ,c");
        assert_eq!(github_tokens(), vec!["a", "b", "c"]);
        std::env::remove_var("GITHUB_TOKENS");
    }
}
