//! Thin Elasticsearch-compatible client over `reqwest` — written only by
//! the Crawler, read only by the Downloader. Rolled by hand over `reqwest`
//! + `serde_json` rather than pulling in the official `elasticsearch`
//! crate's heavier builder API.

pub mod descriptor;

use serde_json::{json, Value};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::PipelineError;
use crate::retry::{retry_with_policy, RetryPolicy};
use descriptor::RepositoryDescriptor;

pub const INDEX_NAME: &str = "github-coding-repos";

pub struct SearchIndexClient {
    client: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl SearchIndexClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            breaker: CircuitBreaker::new("search-index"),
        }
    }

    fn doc_id(full_name: &str) -> String {
        percent_encoding::utf8_percent_encode(full_name, percent_encoding::NON_ALPHANUMERIC)
            .to_string()
    }

    /// Creates the index with a typed mapping if absent; idempotent if
    /// present.
    pub async fn ensure_index(&self) -> Result<(), PipelineError> {
        let policy = RetryPolicy::default_network();
        retry_with_policy(&policy, || {
            self.breaker.call(|| async {
                let exists = self
                    .client
                    .head(format!("{}/{}", self.base_url, INDEX_NAME))
                    .send()
                    .await?
                    .status()
                    .is_success();

                if exists {
                    return Ok(());
                }

                let mapping = json!({
                    "mappings": {
                        "properties": {
                            "display_name": { "type": "keyword" },
                            "full_name": { "type": "keyword" },
                            "url": { "type": "keyword" },
                            "language": { "type": "keyword" },
                            "description": { "type": "text" },
                            "stars": { "type": "integer" },
                            "forks": { "type": "integer" },
                            "topics": { "type": "keyword" },
                            "discovered_at": { "type": "date" }
                        }
                    }
                });

                let resp = self
                    .client
                    .put(format!("{}/{}", self.base_url, INDEX_NAME))
                    .json(&mapping)
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    return Err(PipelineError::permanent_run(format!(
                        "failed to create index {}: {}",
                        INDEX_NAME,
                        resp.status()
                    )));
                }
                Ok(())
            })
        })
        .await
    }

    /// Upserts keyed by `full_name` — existing document overwritten.
    pub async fn upsert(&self, descriptor: &RepositoryDescriptor) -> Result<(), PipelineError> {
        descriptor.validate()?;
        let id = Self::doc_id(&descriptor.full_name);

        let policy = RetryPolicy::default_network();
        retry_with_policy(&policy, || {
            self.breaker.call(|| async {
                let resp = self
                    .client
                    .put(format!("{}/{}/_doc/{}", self.base_url, INDEX_NAME, id))
                    .json(descriptor)
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    return Err(PipelineError::transient(format!(
                        "search index upsert failed for {}: {}",
                        descriptor.full_name,
                        resp.status()
                    )));
                }
                Ok(())
            })
        })
        .await
    }

    /// Paginated query ordered by stars descending.
    pub async fn fetch_page(&self, from: u64, size: u64) -> Result<Vec<RepositoryDescriptor>, PipelineError> {
        let body = json!({
            "from": from,
            "size": size,
            "sort": [{ "stars": "desc" }],
            "query": { "match_all": {} }
        });

        let policy = RetryPolicy::default_network();
        let parsed: Value = retry_with_policy(&policy, || {
            let body = body.clone();
            self.breaker.call(|| async {
                let resp = self
                    .client
                    .post(format!("{}/{}/_search", self.base_url, INDEX_NAME))
                    .json(&body)
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    return Err(PipelineError::transient(format!(
                        "search index query failed: {}",
                        resp.status()
                    )));
                }

                resp.json::<Value>().await.map_err(PipelineError::from)
            })
        })
        .await?;

        let hits = parsed["hits"]["hits"].as_array().cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(source) = hit.get("_source") {
                if let Ok(descriptor) = serde_json::from_value::<RepositoryDescriptor>(source.clone()) {
                    out.push(descriptor);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_url_safe_for_slash_containing_names() {
        let id = SearchIndexClient::doc_id("rust-lang/rust");
        assert!(!id.contains('/'));
        assert!(id.contains("rust-lang"));
    }
}
