//! Search-engine adapters.
//!
//! An adapter is a stateless protocol client for one external engine:
//! a pure function of `(query, max_results)` to a result page, plus the
//! engine it serves. Timeouts, transient-fault retry and engine-specific
//! parsing live here; everything downstream of the raw result page is the
//! pipeline's business.

mod adapter;
mod error;
mod registry;
pub mod retry;
mod searxng;

pub use adapter::{EngineResult, SearchAdapter};
pub use error::SearchError;
pub use registry::AdapterRegistry;
pub use retry::with_retries;
pub use searxng::SearxngAdapter;
