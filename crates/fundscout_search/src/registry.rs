//! Enum-keyed adapter registry, fixed at startup.

use crate::adapter::SearchAdapter;
use crate::error::SearchError;
use fundscout_protocol::SearchEngine;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps engines to their adapters. Built once during wiring; lookups for an
/// unregistered engine are terminal (`adapter.unsupported_engine`).
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SearchEngine, Arc<dyn SearchAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, adapter: Arc<dyn SearchAdapter>) -> Self {
        self.adapters.insert(adapter.engine(), adapter);
        self
    }

    pub fn get(&self, engine: SearchEngine) -> Result<Arc<dyn SearchAdapter>, SearchError> {
        self.adapters
            .get(&engine)
            .cloned()
            .ok_or(SearchError::UnsupportedEngine(engine))
    }

    pub fn engines(&self) -> Vec<SearchEngine> {
        self.adapters.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EngineResult;
    use async_trait::async_trait;

    struct NullAdapter;

    #[async_trait]
    impl SearchAdapter for NullAdapter {
        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Vec<EngineResult>, SearchError> {
            Ok(Vec::new())
        }

        fn engine(&self) -> SearchEngine {
            SearchEngine::Searxng
        }
    }

    #[test]
    fn lookup_round_trips() {
        let registry = AdapterRegistry::new().register(Arc::new(NullAdapter));
        assert!(registry.get(SearchEngine::Searxng).is_ok());
        assert_eq!(registry.engines(), vec![SearchEngine::Searxng]);
    }

    #[test]
    fn empty_registry_reports_unsupported() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.get(SearchEngine::Searxng),
            Err(SearchError::UnsupportedEngine(SearchEngine::Searxng))
        ));
    }
}
