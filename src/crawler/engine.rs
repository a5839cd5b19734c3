//! HTML parsing for crawl pages: search-result rows and repository landing
//! pages. Several selectors are tried in priority order per field since
//! target markup changes without notice and a single selector is brittle.

use scraper::{ElementRef, Html, Selector};

use crate::error::PipelineError;
use crate::search_index::descriptor::{clean_language_string, parse_number};

/// One row scraped off a search-result listing page: enough to locate the
/// repository landing page, not enough to index yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub full_name: String,
    pub url: String,
}

/// Parses a listing page into candidate repository links. Markup sources
/// vary (different code-hosting search result layouts); several link
/// selectors are tried in order and the first to yield any hits wins.
pub fn parse_search_results(html: &str) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);

    let link_selectors = ["a.v-align-middle", "a[data-hydro-click]", "h3 a"];

    for css in link_selectors {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };

        let mut out = Vec::new();
        for a in doc.select(&sel) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let Some(full_name) = full_name_from_href(href) else {
                continue;
            };
            let url = normalize_repo_url(href);
            out.push(SearchHit { full_name, url });
        }

        if !out.is_empty() {
            out.dedup_by(|a, b| a.full_name == b.full_name);
            return out;
        }
    }

    Vec::new()
}

fn full_name_from_href(href: &str) -> Option<String> {
    let path = href
        .trim_start_matches("https://github.com/")
        .trim_start_matches("http://github.com/")
        .trim_start_matches('/');

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;

    const RESERVED: &[&str] = &["search", "topics", "sponsors", "marketplace", "settings"];
    if RESERVED.contains(&owner) {
        return None;
    }

    Some(format!("{}/{}", owner, repo))
}

fn normalize_repo_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("https://github.com{}", href)
    }
}

/// Everything scraped off a repository's own landing page: stars, forks,
/// topics, description, refined language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoPageFacts {
    pub language: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub topics: Vec<String>,
}

/// Tries several selectors per field, since landing-page markup is not
/// stable across hosting revisions. Unrecognized or unparsable fields are
/// left at their zero value rather than failing the whole scrape — this is
/// a best-effort enrichment pass, not a validation gate (that's
/// `RepositoryDescriptor::validate`).
pub fn parse_repo_page(html: &str) -> Result<RepoPageFacts, PipelineError> {
    let doc = Html::parse_document(html);

    let language = first_text(&doc, &["span[itemprop=programmingLanguage]", "span.lang"])
        .map(|raw| clean_language_string(&raw))
        .unwrap_or_default();

    let description = first_text(
        &doc,
        &["p.f4.my-3", "span[itemprop=about]", "div.repository-description"],
    )
    .unwrap_or_default();

    let stars = first_text(&doc, &["#repo-stars-counter-star", "a[href$=stargazers] strong"])
        .and_then(|raw| parse_number(&raw).ok())
        .unwrap_or(0);

    let forks = first_text(&doc, &["#repo-network-counter", "a[href$=forks] strong"])
        .and_then(|raw| parse_number(&raw).ok())
        .unwrap_or(0);

    let topics = topic_texts(&doc, "a.topic-tag");

    Ok(RepoPageFacts {
        language,
        description,
        stars,
        forks,
        topics,
    })
}

fn first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    for css in selectors {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        if let Some(node) = doc.select(&sel).next() {
            let text = collapse_text(&node);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn topic_texts(doc: &Html, css: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(css) else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(|n| collapse_text(&n))
        .filter(|s| !s.is_empty())
        .collect()
}

fn collapse_text(node: &ElementRef<'_>) -> String {
    node.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_results_from_anchor_with_hydro_click() {
        let html = r#"
            <html><body>
            <a data-hydro-click="x" href="/rust-lang/rust">rust-lang/rust</a>
            <a data-hydro-click="x" href="/search/advanced">should be filtered</a>
            </body></html>
        "#;
        let hits = parse_search_results(html);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].full_name, "rust-lang/rust");
        assert_eq!(hits[0].url, "https://github.com/rust-lang/rust");
    }

    #[test]
    fn repo_page_facts_default_to_empty_on_missing_markup() {
        let facts = parse_repo_page("<html><body>nothing here</body></html>").unwrap();
        assert_eq!(facts.language, "");
        assert_eq!(facts.stars, 0);
        assert!(facts.topics.is_empty());
    }

    #[test]
    fn repo_page_extracts_language_stars_and_topics() {
        let html = r#"
            <html><body>
            <span itemprop="programmingLanguage">Rust 83.2%</span>
            <p class="f4 my-3">A blazing fast thing</p>
            <a class="topic-tag">compiler</a>
            <a class="topic-tag">parser</a>
            </body></html>
        "#;
        let facts = parse_repo_page(html).unwrap();
        assert_eq!(facts.language, "Rust");
        assert_eq!(facts.description, "A blazing fast thing");
        assert_eq!(facts.topics, vec!["compiler".to_string(), "parser".to_string()]);
    }
}
