//! Static search-term list driving the crawl matrix.
//!
//! The production list is ~275 terms crossing language with topic; this is
//! a representative cross-section (language × {framework, library, cli,
//! compiler, parser} plus a handful of evergreen topic searches) kept small
//! enough to read at a glance. Extending it is a one-line addition, not a
//! structural change.

pub const DEFAULT_PAGE_DEPTH: u32 = 5;

pub fn search_terms() -> Vec<String> {
    let languages = [
        "rust", "go", "python", "typescript", "javascript", "java", "kotlin", "swift", "c",
        "c++", "c#", "ruby", "php", "scala", "haskell", "elixir", "zig", "clojure", "lua",
        "ocaml",
    ];
    let topics = ["framework", "library", "cli tool", "compiler", "parser"];

    let mut terms: Vec<String> = Vec::with_capacity(languages.len() * topics.len());
    for language in languages {
        for topic in topics {
            terms.push(format!("{} {}", language, topic));
        }
    }

    terms.extend(
        [
            "web framework",
            "http server",
            "database driver",
            "machine learning",
            "game engine",
            "static site generator",
            "build tool",
            "package manager",
            "linter",
            "code formatter",
            "test framework",
            "orm library",
            "cryptography library",
            "networking library",
            "concurrency runtime",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_are_non_empty_and_unique() {
        let terms = search_terms();
        assert!(!terms.is_empty());
        let unique: std::collections::HashSet<_> = terms.iter().collect();
        assert_eq!(unique.len(), terms.len());
    }
}
