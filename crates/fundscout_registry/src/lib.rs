//! Domain registry, persistence repositories and the blacklist cache.
//!
//! The registry is the authoritative record of every domain the pipeline
//! has sighted: status, quality counters and the monotonic best confidence
//! score. The core talks to persistence exclusively through the repository
//! traits here; the SQLite implementations are the default backing.

pub mod blacklist;
pub mod cache;
mod error;
pub mod models;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use blacklist::BlacklistCache;
pub use cache::{CacheError, CacheStore, LruTtlCache};
pub use error::RegistryError;
pub use models::{CandidateRecord, DomainRecord, SessionRecord, WorkflowErrorRecord};
pub use registry::{DomainRegistry, JudgementUpdate};
pub use repository::{
    CandidateRepository, DomainRepository, ErrorRepository, SessionRepository,
};
pub use schema::ensure_schema;
pub use sqlite::SqliteStore;
