//! The `SearchAdapter` capability.

use crate::error::SearchError;
use async_trait::async_trait;
use fundscout_protocol::SearchEngine;

/// One result as returned by an engine, in native ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    /// Unmodified URL; host normalization is the validation consumer's job.
    pub url: String,
    pub title: String,
    pub description: String,
    /// 1-based position in the engine's native ordering.
    pub rank: u32,
}

/// Protocol-specific client wrapping one external search engine.
///
/// Implementations must be stateless beyond a configured HTTP client and
/// base URL. An empty result page is a normal success.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Execute one query, truncating to `max_results` if the engine returns
    /// more.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<EngineResult>, SearchError>;

    /// The engine this adapter serves; the registry dispatch key.
    fn engine(&self) -> SearchEngine;
}
