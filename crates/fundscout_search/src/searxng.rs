//! SearXNG metasearch adapter.
//!
//! Endpoint: `GET {base_url}/search?q={query}&format=json`. A self-hosted
//! SearXNG instance needs `format: json` enabled in its settings; no
//! authentication. The snippet field is called `content` in SearXNG's JSON.
//! Rate limiting surfaces as HTTP 429, which is terminal here like any
//! other 4xx (the instance is ours; sustained 429 means misconfiguration,
//! not load to be retried into).

use crate::adapter::{EngineResult, SearchAdapter};
use crate::error::SearchError;
use crate::retry::with_retries;
use async_trait::async_trait;
use fundscout_protocol::defaults::{
    ADAPTER_CONNECT_TIMEOUT, ADAPTER_MAX_ATTEMPTS, ADAPTER_TOTAL_DEADLINE,
};
use fundscout_protocol::SearchEngine;
use serde::Deserialize;
use tracing::debug;

/// Response shape of SearXNG's JSON format. Unknown fields ignored.
#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    /// SearXNG's name for the snippet.
    #[serde(default)]
    content: String,
}

pub struct SearxngAdapter {
    base_url: String,
    client: reqwest::Client,
    max_attempts: u32,
}

impl SearxngAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(ADAPTER_CONNECT_TIMEOUT)
            .timeout(ADAPTER_TOTAL_DEADLINE)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            max_attempts: ADAPTER_MAX_ATTEMPTS,
        }
    }

    /// Single-attempt variant for tests that script failures themselves.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    async fn attempt(&self, query: &str, max_results: usize) -> Result<Vec<EngineResult>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SearchError::Http5xx {
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            return Err(SearchError::Http4xx {
                status: status.as_u16(),
            });
        }

        let body: SearxngResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let results = body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(max_results)
            .enumerate()
            .map(|(idx, r)| EngineResult {
                url: r.url,
                title: r.title,
                description: r.content,
                rank: idx as u32 + 1,
            })
            .collect();
        Ok(results)
    }
}

#[async_trait]
impl SearchAdapter for SearxngAdapter {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EngineResult>, SearchError> {
        let results =
            with_retries(self.max_attempts, || self.attempt(query, max_results)).await?;
        debug!(query, count = results.len(), "searxng search ok");
        Ok(results)
    }

    fn engine(&self) -> SearchEngine {
        SearchEngine::Searxng
    }
}

fn classify_reqwest(err: reqwest::Error) -> SearchError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        SearchError::Network(err.to_string())
    } else if err.is_decode() {
        SearchError::Parse(err.to_string())
    } else {
        SearchError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_searxng_result_shape() {
        let json = r#"{
            "query": "bulgaria education scholarships",
            "results": [
                {"url": "https://education.gov.bg/grants/stem",
                 "title": "Bulgaria STEM Scholarships 2025",
                 "content": "Grants and funding for schools",
                 "engine": "duckduckgo",
                 "score": 1.0},
                {"url": "https://random-blog.example/tips",
                 "title": "How to find money",
                 "content": ""}
            ],
            "number_of_results": 2
        }"#;
        let parsed: SearxngResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].content, "Grants and funding for schools");
    }

    #[test]
    fn missing_results_field_is_an_empty_page() {
        let parsed: SearxngResponse = serde_json::from_str(r#"{"query": "x"}"#).unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn base_url_is_normalized() {
        let adapter = SearxngAdapter::new("http://127.0.0.1:8888/");
        assert_eq!(adapter.base_url, "http://127.0.0.1:8888");
        assert_eq!(adapter.engine(), SearchEngine::Searxng);
    }
}
