//! Per-file quality score: a deterministic function of
//! content and language, clamped to [0, 100].

const GENERATED_MARKERS: &[&str] = &[
    "do not edit",
    "autogenerated",
    "auto-generated",
    "this file is generated",
    "@generated",
    "code generated by",
];

const TEST_FIXTURE_MARKERS: &[&str] = &["fixture", "__snapshots__", ".snap"];

const FRAMEWORK_MARKERS: &[&str] = &[
    "#[derive", "@Override", "async def", "impl Trait", "React.Component", "func (",
    "export default", "public class", "fn main(",
];

pub fn score_file(content: &str, language: &str, repo_relative_path: &str) -> i32 {
    let mut score = 50i32;

    let line_count = content.lines().count();
    let comment_lines = count_comment_lines(content, language);
    let ratio = if line_count > 0 {
        comment_lines as f64 / line_count as f64
    } else {
        0.0
    };

    if (0.10..=0.30).contains(&ratio) {
        score += 10;
    }

    if has_block_comment_or_docstring(content, language) {
        score += 10;
    }

    if (50..=500).contains(&line_count) {
        score += 10;
    }

    if FRAMEWORK_MARKERS.iter().any(|m| content.contains(m)) {
        score += 5;
    }

    if has_moderate_branching(content) {
        score += 5;
    }

    let lower = content.to_lowercase();
    if GENERATED_MARKERS.iter().any(|m| lower.contains(m)) {
        score -= 10;
    }

    let lower_path = repo_relative_path.to_lowercase();
    if TEST_FIXTURE_MARKERS.iter().any(|m| lower_path.contains(m)) {
        score -= 10;
    }

    score.clamp(0, 100)
}

fn line_comment_prefix(language: &str) -> Option<&'static str> {
    match language {
        "Rust" | "Go" | "TypeScript" | "JavaScript" | "Java" | "Kotlin" | "Swift" | "C"
        | "C++" | "C#" | "Zig" | "Scala" => Some("//"),
        "Python" | "Ruby" => Some("#"),
        "Haskell" => Some("--"),
        "Elixir" => Some("#"),
        "Clojure" => Some(";"),
        "Lua" => Some("--"),
        "OCaml" => None,
        "PHP" => Some("//"),
        _ => None,
    }
}

fn count_comment_lines(content: &str, language: &str) -> usize {
    let Some(prefix) = line_comment_prefix(language) else {
        return 0;
    };
    content.lines().filter(|line| line.trim_start().starts_with(prefix)).count()
}

fn has_block_comment_or_docstring(content: &str, language: &str) -> bool {
    match language {
        "Python" => content.contains("\"\"\"") || content.contains("'''"),
        "Rust" => content.contains("///") || content.contains("/**"),
        "OCaml" => content.contains("(*"),
        _ => content.contains("/*"),
    }
}

/// Cheap cyclomatic-complexity proxy: counts branching keywords rather
/// than building a real control-flow graph.
fn has_moderate_branching(content: &str) -> bool {
    const KEYWORDS: &[&str] = &["if ", "else", "match ", "switch", "for ", "while ", "case "];
    let count: usize = KEYWORDS.iter().map(|k| content.matches(k).count()).sum();
    (2..=40).contains(&count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_untouched_content_stays_near_fifty() {
        let content = "x".repeat(10);
        let score = score_file(&content, "Rust", "a.rs");
        assert!((0..=100).contains(&score));
    }

    #[test]
    fn generated_marker_reduces_score() {
        let content = "// THIS FILE IS GENERATED do not edit\nfn main() {}\n";
        let with_marker = score_file(content, "Rust", "gen.rs");
        let without_marker = score_file("fn main() {}\n", "Rust", "main.rs");
        assert!(with_marker < without_marker);
    }

    #[test]
    fn test_fixture_path_reduces_score() {
        let content = "fn main() {}\n".repeat(60);
        let fixture_score = score_file(&content, "Rust", "tests/fixtures/sample.rs");
        let normal_score = score_file(&content, "Rust", "src/sample.rs");
        assert!(fixture_score < normal_score);
    }

    #[test]
    fn score_always_clamped() {
        let content = "// do not edit, autogenerated, this file is generated\n".repeat(5);
        let score = score_file(&content, "Rust", "fixture.rs");
        assert!((0..=100).contains(&score));
    }
}
