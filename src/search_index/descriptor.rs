//! Repository descriptor and the two pure string-cleaning helpers
//! the Crawler relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryDescriptor {
    pub display_name: String,
    pub full_name: String,
    pub url: String,
    pub language: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub topics: Vec<String>,
    pub discovered_at: DateTime<Utc>,
}

impl RepositoryDescriptor {
    /// Validates a descriptor's required invariants. Violations are
    /// `Validation` errors — rejected with no side effect.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.full_name.trim().is_empty() {
            return Err(PipelineError::validation("descriptor missing full name"));
        }
        if !self.full_name.contains('/') {
            return Err(PipelineError::validation(format!(
                "full_name '{}' is not owner/name",
                self.full_name
            )));
        }
        let (owner, repo) = self
            .full_name
            .split_once('/')
            .expect("checked contains('/') above");
        if owner.is_empty() || repo.is_empty() {
            return Err(PipelineError::validation(format!(
                "full_name '{}' has an empty owner or repo segment",
                self.full_name
            )));
        }
        Ok(())
    }
}

/// Strips trailing language percentages ("Rust 80%") and "Updated N ago"
/// noise, collapses whitespace. Idempotent: `clean(clean(s)) == clean(s)`.
pub fn clean_language_string(raw: &str) -> String {
    let mut s = raw.to_string();

    // Drop "Updated ... ago" tails (case-insensitive), wherever they start.
    if let Some(idx) = s.to_lowercase().find("updated") {
        s.truncate(idx);
    }

    // Keep only the first whitespace-separated token that isn't a bare
    // percentage, so "Rust 80% Python 15%" collapses to "Rust".
    let first_token = s
        .split_whitespace()
        .find(|tok| !tok.trim_end_matches('%').chars().all(|c| c.is_ascii_digit() || c == '.'))
        .unwrap_or("");

    first_token
        .trim()
        .trim_end_matches('%')
        .trim()
        .to_string()
}

/// Parses GitHub-style abbreviated counts: `"1.2k" -> 1200`,
/// `"1,234,567" -> 1234567`, `"5M" -> 5000000`. Empty input is an error.
pub fn parse_number(raw: &str) -> Result<u64, PipelineError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(PipelineError::validation("empty number string"));
    }

    let lower = cleaned.to_lowercase();
    let (digits, multiplier) = if let Some(stripped) = lower.strip_suffix('k') {
        (stripped.to_string(), 1_000.0)
    } else if let Some(stripped) = lower.strip_suffix('m') {
        (stripped.to_string(), 1_000_000.0)
    } else if let Some(stripped) = lower.strip_suffix('b') {
        (stripped.to_string(), 1_000_000_000.0)
    } else {
        (lower, 1.0)
    };

    let value: f64 = digits
        .parse()
        .map_err(|_| PipelineError::validation(format!("cannot parse number from '{}'", raw)))?;
    Ok((value * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_language_strips_percentage_and_updated_noise() {
        assert_eq!(clean_language_string("Rust 80% Python 15%"), "Rust");
        assert_eq!(clean_language_string("Rust Updated 3 days ago"), "Rust");
        assert_eq!(clean_language_string("Rust"), "Rust");
    }

    #[test]
    fn clean_language_is_idempotent() {
        for input in ["Rust 80% Python 15%", "Go Updated 2 hours ago", "TypeScript", ""] {
            let once = clean_language_string(input);
            let twice = clean_language_string(&once);
            assert_eq!(once, twice, "not idempotent for input {:?}", input);
        }
    }

    #[test]
    fn clean_language_has_no_percent_or_updated() {
        let cleaned = clean_language_string("JavaScript 42.0% Updated yesterday");
        assert!(!cleaned.contains('%'));
        assert!(!cleaned.to_lowercase().contains("updated"));
    }

    #[test]
    fn parse_number_handles_suffixes() {
        assert_eq!(parse_number("1.2k").unwrap(), 1200);
        assert_eq!(parse_number("1,234,567").unwrap(), 1_234_567);
        assert_eq!(parse_number("5M").unwrap(), 5_000_000);
    }

    #[test]
    fn parse_number_rejects_empty() {
        assert!(parse_number("").is_err());
        assert!(parse_number("   ").is_err());
    }

    #[test]
    fn descriptor_validates_full_name() {
        let mut d = sample_descriptor();
        d.full_name = "".to_string();
        assert!(d.validate().is_err());

        d.full_name = "rust-lang/rust".to_string();
        assert!(d.validate().is_ok());

        d.full_name = "norepo".to_string();
        assert!(d.validate().is_err());
    }

    fn sample_descriptor() -> RepositoryDescriptor {
        RepositoryDescriptor {
            display_name: "rust".into(),
            full_name: "rust-lang/rust".into(),
            url: "https://github.com/rust-lang/rust".into(),
            language: "Rust".into(),
            description: "".into(),
            stars: 0,
            forks: 0,
            topics: vec![],
            discovered_at: Utc::now(),
        }
    }
}
