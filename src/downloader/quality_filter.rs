//! Pure quality filter — a function of a
//! descriptor only, no I/O. Hard rejects short-circuit before the soft
//! score is even computed, a cheap-check-first style shared with the
//! crawler's block-detection heuristics.

use aho_corasick::AhoCorasick;
use chrono::{DateTime, Utc};

use crate::search_index::descriptor::RepositoryDescriptor;

pub const DEFAULT_MIN_STARS: u64 = 10;
pub const DEFAULT_MIN_FORKS: u64 = 3;
pub const PASS_THRESHOLD: i32 = 50;

const MIN_SIZE_KB: i64 = 1;
const MAX_SIZE_KB: i64 = 50 * 1024;
const SIZE_BONUS: i32 = 10;

const BLOCKLIST_PATTERNS: &[&str] = &[
    "tutorial",
    "awesome-",
    "cheatsheet",
    "cheat-sheet",
    "demo",
    "homework",
    "leetcode",
    "interview-questions",
    "learning-",
    "-exercises",
    "course-",
    "bootcamp",
];

const BLOCKED_DESCRIPTION_SUBSTRINGS: &[&str] = &["for educational purposes", "my solutions to"];

const LANGUAGE_ALLOWLIST: &[&str] = &[
    "Rust", "Go", "Python", "TypeScript", "JavaScript", "Java", "Kotlin", "Swift", "C", "C++",
    "C#", "Ruby", "PHP", "Scala", "Haskell", "Elixir", "Zig", "Clojure", "Lua", "OCaml",
];

/// Result of running a descriptor through the filter, carrying enough
/// detail for the caller to decide the resulting clone status.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Pass { score: i32 },
    Reject { reason: String },
}

pub struct QualityFilter {
    blocklist: AhoCorasick,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityFilter {
    pub fn new() -> Self {
        Self {
            blocklist: AhoCorasick::new(BLOCKLIST_PATTERNS).expect("static blocklist is valid"),
        }
    }

    pub fn evaluate(&self, descriptor: &RepositoryDescriptor) -> FilterOutcome {
        let lower_name = descriptor.full_name.to_lowercase();
        if self.blocklist.is_match(&lower_name) {
            return FilterOutcome::Reject {
                reason: "full name matches noise blocklist".to_string(),
            };
        }

        if descriptor.stars < DEFAULT_MIN_STARS {
            return FilterOutcome::Reject {
                reason: format!("stars {} below minimum {}", descriptor.stars, DEFAULT_MIN_STARS),
            };
        }
        if descriptor.forks < DEFAULT_MIN_FORKS {
            return FilterOutcome::Reject {
                reason: format!("forks {} below minimum {}", descriptor.forks, DEFAULT_MIN_FORKS),
            };
        }

        if !descriptor.language.is_empty() && !LANGUAGE_ALLOWLIST.contains(&descriptor.language.as_str()) {
            return FilterOutcome::Reject {
                reason: format!("language '{}' not in allowlist", descriptor.language),
            };
        }

        let lower_desc = descriptor.description.to_lowercase();
        if BLOCKED_DESCRIPTION_SUBSTRINGS.iter().any(|b| lower_desc.contains(b)) {
            return FilterOutcome::Reject {
                reason: "description matches blocked substring".to_string(),
            };
        }

        let score = soft_score(descriptor, Utc::now());
        if score < PASS_THRESHOLD {
            return FilterOutcome::Reject {
                reason: format!("soft score {} below pass threshold {}", score, PASS_THRESHOLD),
            };
        }

        FilterOutcome::Pass { score }
    }
}

/// Stars (log-scaled, 40), fork ratio (20), recency (20), and topics
/// present (10) — the four components the descriptor alone can support.
/// `discovered_at` stands in for "pushed within 1 year" since the
/// descriptor has no separate last-push timestamp. The remaining size
/// component isn't computed here at all: the descriptor carries no byte
/// size (GitHub's search results page never exposes it), so this caps out
/// at 90, not 100, until `rescore_with_size` runs after clone.
fn soft_score(descriptor: &RepositoryDescriptor, now: DateTime<Utc>) -> i32 {
    let mut score = 0.0f64;

    score += 40.0 * (((descriptor.stars + 1) as f64).ln() / ((10_000u64 + 1) as f64).ln()).min(1.0);

    if descriptor.stars > 0 {
        let ratio = descriptor.forks as f64 / descriptor.stars as f64;
        if (0.05..=0.3).contains(&ratio) {
            score += 20.0;
        }
    }

    let age_days = (now - descriptor.discovered_at).num_days();
    if (0..=365).contains(&age_days) {
        score += 20.0;
    }

    if !descriptor.topics.is_empty() {
        score += 10.0;
    }

    score.round() as i32
}

/// Adds the size-in-range bonus once the repository's on-disk size is
/// known post-clone, capping the combined total at 100. Called by
/// `clone_scheduler::clone_one` to correct the score persisted by
/// `soft_score` at filter time.
pub fn rescore_with_size(base_score: i32, size_kb: i64) -> i32 {
    let bonus = if size_kb > MIN_SIZE_KB && size_kb < MAX_SIZE_KB { SIZE_BONUS } else { 0 };
    (base_score + bonus).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_descriptor() -> RepositoryDescriptor {
        RepositoryDescriptor {
            display_name: "rust".into(),
            full_name: "rust-lang/rust".into(),
            url: "https://github.com/rust-lang/rust".into(),
            language: "Rust".into(),
            description: "A systems programming language".into(),
            stars: 5000,
            forks: 800,
            topics: vec!["compiler".into()],
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_blocklisted_names() {
        let filter = QualityFilter::new();
        let mut d = base_descriptor();
        d.full_name = "someone/awesome-rust".into();
        assert!(matches!(filter.evaluate(&d), FilterOutcome::Reject { .. }));
    }

    #[test]
    fn rejects_below_minimum_stars() {
        let filter = QualityFilter::new();
        let mut d = base_descriptor();
        d.stars = 2;
        assert!(matches!(filter.evaluate(&d), FilterOutcome::Reject { .. }));
    }

    #[test]
    fn rejects_disallowed_language() {
        let filter = QualityFilter::new();
        let mut d = base_descriptor();
        d.language = "Brainfuck".into();
        assert!(matches!(filter.evaluate(&d), FilterOutcome::Reject { .. }));
    }

    #[test]
    fn passes_healthy_descriptor() {
        let filter = QualityFilter::new();
        let d = base_descriptor();
        match filter.evaluate(&d) {
            FilterOutcome::Pass { score } => assert!(score >= PASS_THRESHOLD),
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[test]
    fn rejects_low_score_despite_passing_hard_checks() {
        let filter = QualityFilter::new();
        let mut d = base_descriptor();
        d.stars = 11;
        d.forks = 3;
        d.topics = vec![];
        d.discovered_at = Utc::now() - chrono::Duration::days(900);
        assert!(matches!(filter.evaluate(&d), FilterOutcome::Reject { .. }));
    }

    #[test]
    fn rescore_with_size_adds_bonus_in_range() {
        assert_eq!(rescore_with_size(80, 2_048), 90);
        assert_eq!(rescore_with_size(80, 1), 80);
        assert_eq!(rescore_with_size(80, 60 * 1024), 80);
    }

    #[test]
    fn rescore_with_size_caps_at_one_hundred() {
        assert_eq!(rescore_with_size(95, 2_048), 100);
    }
}
