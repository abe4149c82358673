//! Narrow repository interfaces. The core is persistence-agnostic: the
//! pipeline only ever sees these traits.

use crate::error::RegistryError;
use crate::models::{CandidateRecord, DomainRecord, SessionRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundscout_protocol::{
    CandidateDraft, CandidateId, RequestId, SessionId, SessionStatus, WorkflowErrorEvent,
};
use rust_decimal::Decimal;

#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<Option<DomainRecord>, RegistryError>;

    /// Create the domain as DISCOVERED if absent. Returns whether a row was
    /// created.
    async fn insert_discovered(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RegistryError>;

    async fn touch_last_processed(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError>;

    /// Versioned full-row update: applies `record` only if the stored
    /// version still matches `record.version`, bumping it by one. Returns
    /// whether the row was updated (false = concurrent writer won).
    async fn update_versioned(&self, record: &DomainRecord) -> Result<bool, RegistryError>;

    async fn blacklisted_domains(&self) -> Result<Vec<String>, RegistryError>;
}

#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Idempotent by `(session_id, url)`: saving the same candidate twice is
    /// a no-op. Returns whether a row was created.
    async fn save(
        &self,
        id: CandidateId,
        draft: &CandidateDraft,
    ) -> Result<bool, RegistryError>;

    async fn count_for_session(&self, session_id: SessionId) -> Result<u64, RegistryError>;

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<CandidateRecord>, RegistryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, record: &SessionRecord) -> Result<(), RegistryError>;

    async fn finalize(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        candidates_found: u64,
        duplicates_detected: u64,
        average_confidence: Option<Decimal>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;

    async fn lookup_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, RegistryError>;

    async fn find_by_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<SessionRecord>, RegistryError>;
}

#[async_trait]
pub trait ErrorRepository: Send + Sync {
    /// Append one workflow error record; returns its row id.
    async fn append(
        &self,
        event: &WorkflowErrorEvent,
        dead_letter: bool,
    ) -> Result<i64, RegistryError>;

    async fn dead_letter_count(&self, session_id: SessionId) -> Result<u64, RegistryError>;
}
