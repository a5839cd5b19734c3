//! Error taxonomy shared by all four binaries.
//!
//! Every fallible operation in the pipeline maps onto one of four
//! categories. The retry wrapper (`crate::retry`) and circuit breaker
//! (`crate::circuit_breaker`) both dispatch on `PipelineError::category`.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Retry with backoff, same unit of work: HTTP 429/5xx, network timeout,
    /// DB deadlock, filesystem EINTR.
    Transient,
    /// Log, mark the row failed, move on: malformed HTML, invalid git repo,
    /// file too large, corrupt bytes.
    PermanentUnit,
    /// Abort the process with a non-zero exit: DB unreachable after N
    /// retries, cannot create required tables, storage root missing.
    PermanentRun,
    /// Reject the input with no side effect: descriptor missing full name,
    /// negative stars, empty clone path.
    Validation,
}

#[derive(thiserror::Error, Debug)]
pub struct PipelineError {
    category: ErrorCategory,
    message: String,
    context: HashMap<String, String>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl PipelineError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transient, message)
    }

    pub fn permanent_unit(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::PermanentUnit, message)
    }

    pub fn permanent_run(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::PermanentRun, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(
        mut self,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.category, ErrorCategory::Transient)
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.category, self.message)?;
        if !self.context.is_empty() {
            write!(f, " (")?;
            let mut first = true;
            for (k, v) in &self.context {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", k, v)?;
                first = false;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        let category = match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => ErrorCategory::Transient,
            sqlx::Error::Database(db_err) if db_err.message().contains("deadlock") => {
                ErrorCategory::Transient
            }
            _ => ErrorCategory::PermanentUnit,
        };
        PipelineError::new(category, format!("database error: {}", e)).with_cause(e)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        let category = if e.is_timeout() || e.is_connect() {
            ErrorCategory::Transient
        } else if let Some(status) = e.status() {
            if status.as_u16() == 429 || status.is_server_error() {
                ErrorCategory::Transient
            } else {
                ErrorCategory::PermanentUnit
            }
        } else {
            ErrorCategory::Transient
        };
        PipelineError::new(category, format!("http error: {}", e)).with_cause(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = PipelineError::permanent_unit("invalid git repo")
            .with_context("path", "/tmp/foo")
            .with_context("repo", "acme/widgets");
        let s = err.to_string();
        assert!(s.starts_with("[PermanentUnit] invalid git repo"));
        assert!(s.contains("path=/tmp/foo"));
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(PipelineError::transient("x").is_retryable());
        assert!(!PipelineError::permanent_unit("x").is_retryable());
        assert!(!PipelineError::permanent_run("x").is_retryable());
        assert!(!PipelineError::validation("x").is_retryable());
    }
}
