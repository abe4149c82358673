//! Shared test doubles and fixtures. Dev-dependency only.

use async_trait::async_trait;
use fundscout_pipeline::{QueryGenerator, QueryGeneratorError};
use fundscout_protocol::{ExecutionRequest, SearchEngine};
use fundscout_registry::{ensure_schema, CacheError, CacheStore, SqliteStore};
use fundscout_search::{with_retries, EngineResult, SearchAdapter, SearchError};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// One scripted adapter outcome, consumed per attempt.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Results(Vec<EngineResult>),
    Http5xx(u16),
    Http4xx(u16),
    Network(String),
    Parse(String),
}

impl ScriptedResponse {
    fn into_result(self) -> Result<Vec<EngineResult>, SearchError> {
        match self {
            ScriptedResponse::Results(results) => Ok(results),
            ScriptedResponse::Http5xx(status) => Err(SearchError::Http5xx { status }),
            ScriptedResponse::Http4xx(status) => Err(SearchError::Http4xx { status }),
            ScriptedResponse::Network(message) => Err(SearchError::Network(message)),
            ScriptedResponse::Parse(message) => Err(SearchError::Parse(message)),
        }
    }
}

/// Scripted search adapter with the production retry discipline.
///
/// Each adapter *attempt* pops the next scripted response; when the script
/// runs dry the adapter answers with `fallback` (empty page by default).
pub struct MockSearchAdapter {
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: Vec<EngineResult>,
    attempts: AtomicU32,
    max_attempts: u32,
}

impl MockSearchAdapter {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Vec::new(),
            attempts: AtomicU32::new(0),
            max_attempts: 3,
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<EngineResult>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Attempts the adapter has made, including retried ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<Vec<EngineResult>, SearchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match scripted {
            Some(response) => response.into_result(),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[async_trait]
impl SearchAdapter for MockSearchAdapter {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<EngineResult>, SearchError> {
        let mut results = with_retries(self.max_attempts, || {
            let outcome = self.next_response();
            async move { outcome }
        })
        .await?;
        results.truncate(max_results);
        Ok(results)
    }

    fn engine(&self) -> SearchEngine {
        SearchEngine::Searxng
    }
}

/// Generator answering with a fixed query list.
pub struct FixedQueryGenerator {
    queries: Vec<String>,
}

impl FixedQueryGenerator {
    pub fn new<S: Into<String>>(queries: Vec<S>) -> Self {
        Self {
            queries: queries.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl QueryGenerator for FixedQueryGenerator {
    async fn generate(
        &self,
        _request: &ExecutionRequest,
    ) -> Result<Vec<String>, QueryGeneratorError> {
        Ok(self.queries.clone())
    }
}

/// Generator that always fails; exercises the trigger failure path.
pub struct FailingQueryGenerator;

#[async_trait]
impl QueryGenerator for FailingQueryGenerator {
    async fn generate(
        &self,
        _request: &ExecutionRequest,
    ) -> Result<Vec<String>, QueryGeneratorError> {
        Err(QueryGeneratorError::Failed("generator offline".into()))
    }
}

/// Cache store that is permanently down; exercises degraded mode.
pub struct UnavailableCacheStore;

impl CacheStore<String, bool> for UnavailableCacheStore {
    fn get(&self, _key: &String) -> Result<Option<bool>, CacheError> {
        Err(CacheError::Unavailable("injected outage".into()))
    }
    fn put(&self, _key: String, _value: bool) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("injected outage".into()))
    }
    fn invalidate(&self, _key: &String) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("injected outage".into()))
    }
}

/// Fresh in-memory SQLite store with the schema applied.
pub async fn memory_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("in-memory sqlite");
    ensure_schema(&pool).await.expect("schema bootstrap");
    SqliteStore::new(pool)
}

/// Shorthand for an engine result row.
pub fn engine_result(url: &str, title: &str, description: &str, rank: u32) -> EngineResult {
    EngineResult {
        url: url.into(),
        title: title.into(),
        description: description.into(),
        rank,
    }
}
