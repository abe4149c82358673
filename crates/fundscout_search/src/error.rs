use fundscout_protocol::{ErrorCategory, SearchEngine};
use thiserror::Error;

/// Terminal adapter failures. The caller converts these into workflow
/// errors; they never escape a stage as Rust errors.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("network failure talking to engine: {0}")]
    Network(String),
    #[error("engine returned server error {status}")]
    Http5xx { status: u16 },
    #[error("engine rejected the request with {status}")]
    Http4xx { status: u16 },
    #[error("malformed engine response: {0}")]
    Parse(String),
    #[error("no adapter registered for engine {0}")]
    UnsupportedEngine(SearchEngine),
}

impl SearchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SearchError::Network(_) => ErrorCategory::AdapterNetwork,
            SearchError::Http5xx { .. } => ErrorCategory::AdapterHttp5xx,
            SearchError::Http4xx { .. } => ErrorCategory::AdapterHttp4xx,
            SearchError::Parse(_) => ErrorCategory::AdapterParse,
            SearchError::UnsupportedEngine(_) => ErrorCategory::UnsupportedEngine,
        }
    }

    /// Worth another attempt within the same adapter call.
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_line_up_with_the_taxonomy() {
        assert_eq!(
            SearchError::Network("reset".into()).category(),
            ErrorCategory::AdapterNetwork
        );
        assert_eq!(
            SearchError::Http5xx { status: 503 }.category(),
            ErrorCategory::AdapterHttp5xx
        );
        assert!(!SearchError::Http4xx { status: 429 }.is_transient());
        assert!(!SearchError::Parse("bad json".into()).is_transient());
        assert!(SearchError::Http5xx { status: 502 }.is_transient());
    }
}
