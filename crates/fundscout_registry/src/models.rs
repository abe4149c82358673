//! Database models.
//!
//! Statuses and scores are stored in their canonical string forms; the
//! typed accessors parse them back. Fixed-point scores are TEXT columns
//! holding exactly two fractional digits, never floats.

use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use fundscout_protocol::{CandidateStatus, DomainStatus, Score, SessionStatus};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct DomainRecord {
    pub domain_name: String,
    pub status: String,
    pub discovered_at: DateTime<Utc>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub best_confidence_score: String,
    pub high_quality_count: i64,
    pub low_quality_count: i64,
    pub consecutive_low_count: i64,
    pub consecutive_error_count: i64,
    pub blacklist_reason: Option<String>,
    pub retry_after: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token; bumped on every versioned update.
    pub version: i64,
}

impl DomainRecord {
    pub fn status(&self) -> Result<DomainStatus, RegistryError> {
        self.status
            .parse()
            .map_err(|_| RegistryError::Corrupt(format!("domain status '{}'", self.status)))
    }

    pub fn best_score(&self) -> Result<Score, RegistryError> {
        self.best_confidence_score.parse().map_err(|_| {
            RegistryError::Corrupt(format!(
                "best confidence score '{}'",
                self.best_confidence_score
            ))
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CandidateRecord {
    pub candidate_id: String,
    pub domain_name: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub engine: String,
    pub confidence_score: String,
    pub status: String,
    pub session_id: String,
    pub discovered_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn confidence(&self) -> Result<Score, RegistryError> {
        self.confidence_score.parse().map_err(|_| {
            RegistryError::Corrupt(format!("confidence score '{}'", self.confidence_score))
        })
    }

    pub fn status(&self) -> Result<CandidateStatus, RegistryError> {
        self.status
            .parse()
            .map_err(|_| RegistryError::Corrupt(format!("candidate status '{}'", self.status)))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub session_id: String,
    pub request_id: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub queries_emitted: i64,
    pub candidates_found: i64,
    pub duplicates_detected: i64,
    pub average_confidence_score: Option<String>,
}

impl SessionRecord {
    pub fn status(&self) -> Result<SessionStatus, RegistryError> {
        self.status
            .parse()
            .map_err(|_| RegistryError::Corrupt(format!("session status '{}'", self.status)))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowErrorRecord {
    pub id: i64,
    pub request_id: String,
    pub session_id: String,
    pub stage: String,
    pub error_type: String,
    pub message: String,
    pub retry_count: i64,
    pub dead_letter: bool,
    pub original_payload: String,
    pub created_at: DateTime<Utc>,
}
