//! SQLite-backed repositories.
//!
//! Runtime-bound queries against the pooled connection; writes that must be
//! atomic claim their row with `UPDATE ... WHERE` and check `rows_affected`.

use crate::error::RegistryError;
use crate::models::{CandidateRecord, DomainRecord, SessionRecord};
use crate::repository::{
    CandidateRepository, DomainRepository, ErrorRepository, SessionRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundscout_protocol::{
    CandidateDraft, CandidateId, CandidateStatus, DomainStatus, RequestId, SessionId,
    SessionStatus, WorkflowErrorEvent,
};
use rust_decimal::Decimal;
use sqlx::{Pool, Sqlite};
use tracing::debug;

/// One pool, all four repositories.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl DomainRepository for SqliteStore {
    async fn lookup(&self, domain: &str) -> Result<Option<DomainRecord>, RegistryError> {
        let record: Option<DomainRecord> =
            sqlx::query_as("SELECT * FROM fs_domain WHERE domain_name = ?")
                .bind(domain)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    async fn insert_discovered(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RegistryError> {
        let rows = sqlx::query(
            r#"
            INSERT INTO fs_domain (domain_name, status, discovered_at)
            VALUES (?, ?, ?)
            ON CONFLICT (domain_name) DO NOTHING
            "#,
        )
        .bind(domain)
        .bind(DomainStatus::Discovered.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows > 0 {
            debug!(domain, "registered new domain");
        }
        Ok(rows > 0)
    }

    async fn touch_last_processed(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        sqlx::query("UPDATE fs_domain SET last_processed_at = ? WHERE domain_name = ?")
            .bind(now.to_rfc3339())
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_versioned(&self, record: &DomainRecord) -> Result<bool, RegistryError> {
        let rows = sqlx::query(
            r#"
            UPDATE fs_domain
            SET status = ?,
                last_processed_at = ?,
                best_confidence_score = ?,
                high_quality_count = ?,
                low_quality_count = ?,
                consecutive_low_count = ?,
                consecutive_error_count = ?,
                blacklist_reason = ?,
                retry_after = ?,
                version = version + 1
            WHERE domain_name = ? AND version = ?
            "#,
        )
        .bind(&record.status)
        .bind(record.last_processed_at.map(|t| t.to_rfc3339()))
        .bind(&record.best_confidence_score)
        .bind(record.high_quality_count)
        .bind(record.low_quality_count)
        .bind(record.consecutive_low_count)
        .bind(record.consecutive_error_count)
        .bind(&record.blacklist_reason)
        .bind(record.retry_after.map(|t| t.to_rfc3339()))
        .bind(&record.domain_name)
        .bind(record.version)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows > 0)
    }

    async fn blacklisted_domains(&self) -> Result<Vec<String>, RegistryError> {
        let domains: Vec<String> =
            sqlx::query_scalar("SELECT domain_name FROM fs_domain WHERE status = ?")
                .bind(DomainStatus::Blacklisted.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(domains)
    }
}

#[async_trait]
impl CandidateRepository for SqliteStore {
    async fn save(&self, id: CandidateId, draft: &CandidateDraft) -> Result<bool, RegistryError> {
        let rows = sqlx::query(
            r#"
            INSERT INTO fs_candidate
                (candidate_id, domain_name, url, title, description, engine,
                 confidence_score, status, session_id, discovered_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (session_id, url) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(&draft.domain_name)
        .bind(&draft.url)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.engine.as_str())
        .bind(draft.confidence_score.to_string())
        .bind(CandidateStatus::PendingCrawl.as_str())
        .bind(draft.session_id.to_string())
        .bind(draft.discovered_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows > 0)
    }

    async fn count_for_session(&self, session_id: SessionId) -> Result<u64, RegistryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fs_candidate WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<CandidateRecord>, RegistryError> {
        let records: Vec<CandidateRecord> = sqlx::query_as(
            "SELECT * FROM fs_candidate WHERE session_id = ? ORDER BY discovered_at, url",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO fs_session
                (session_id, request_id, status, started_at, queries_emitted)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.request_id)
        .bind(&record.status)
        .bind(record.started_at.to_rfc3339())
        .bind(record.queries_emitted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalize(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        candidates_found: u64,
        duplicates_detected: u64,
        average_confidence: Option<Decimal>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            UPDATE fs_session
            SET status = ?,
                completed_at = ?,
                candidates_found = ?,
                duplicates_detected = ?,
                average_confidence_score = ?
            WHERE session_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(completed_at.to_rfc3339())
        .bind(candidates_found as i64)
        .bind(duplicates_detected as i64)
        .bind(average_confidence.map(|d| d.to_string()))
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, RegistryError> {
        let record: Option<SessionRecord> =
            sqlx::query_as("SELECT * FROM fs_session WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    async fn find_by_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<SessionRecord>, RegistryError> {
        let record: Option<SessionRecord> =
            sqlx::query_as("SELECT * FROM fs_session WHERE request_id = ? ORDER BY started_at DESC LIMIT 1")
                .bind(request_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }
}

#[async_trait]
impl ErrorRepository for SqliteStore {
    async fn append(
        &self,
        event: &WorkflowErrorEvent,
        dead_letter: bool,
    ) -> Result<i64, RegistryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO fs_workflow_error
                (request_id, session_id, stage, error_type, message,
                 retry_count, dead_letter, original_payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.request_id.to_string())
        .bind(event.session_id.to_string())
        .bind(event.stage.as_str())
        .bind(event.error_type.as_str())
        .bind(&event.error_message)
        .bind(event.retry_count as i64)
        .bind(dead_letter)
        .bind(event.original_payload.to_string())
        .bind(event.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn dead_letter_count(&self, session_id: SessionId) -> Result<u64, RegistryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fs_workflow_error WHERE session_id = ? AND dead_letter = 1",
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;
    use fundscout_protocol::{ErrorCategory, PipelineStage, RequestId, Score, SearchEngine};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn draft(session_id: SessionId, url: &str) -> CandidateDraft {
        CandidateDraft {
            domain_name: "education.gov.bg".into(),
            url: url.into(),
            title: "Bulgaria STEM Scholarships 2025".into(),
            description: "Grants for schools".into(),
            engine: SearchEngine::Searxng,
            confidence_score: "0.95".parse().unwrap(),
            session_id,
            discovered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_discovered_is_create_once() {
        let store = store().await;
        let now = Utc::now();
        assert!(store.insert_discovered("education.gov.bg", now).await.unwrap());
        assert!(!store.insert_discovered("education.gov.bg", now).await.unwrap());

        let record = store.lookup("education.gov.bg").await.unwrap().unwrap();
        assert_eq!(record.status().unwrap(), DomainStatus::Discovered);
        assert_eq!(record.version, 0);
        assert_eq!(record.best_score().unwrap(), Score::zero());
    }

    #[tokio::test]
    async fn versioned_update_detects_stale_writers() {
        let store = store().await;
        store.insert_discovered("us-bulgaria.org", Utc::now()).await.unwrap();

        let mut record = store.lookup("us-bulgaria.org").await.unwrap().unwrap();
        record.status = DomainStatus::ProcessedHighQuality.as_str().to_string();
        record.best_confidence_score = "0.71".into();
        record.high_quality_count = 1;
        assert!(store.update_versioned(&record).await.unwrap());

        // The same (now stale) snapshot loses.
        assert!(!store.update_versioned(&record).await.unwrap());

        let fresh = store.lookup("us-bulgaria.org").await.unwrap().unwrap();
        assert_eq!(fresh.version, 1);
        assert_eq!(fresh.best_confidence_score, "0.71");
    }

    #[tokio::test]
    async fn candidate_save_is_idempotent_by_session_and_url() {
        let store = store().await;
        store.insert_discovered("education.gov.bg", Utc::now()).await.unwrap();
        let session = SessionId::new();
        let d = draft(session, "https://education.gov.bg/grants/stem");

        assert!(store.save(CandidateId::new(), &d).await.unwrap());
        assert!(!store.save(CandidateId::new(), &d).await.unwrap());
        assert_eq!(store.count_for_session(session).await.unwrap(), 1);

        // Same URL in another session is a distinct candidate.
        let other = SessionId::new();
        assert!(store.save(CandidateId::new(), &draft(other, "https://education.gov.bg/grants/stem")).await.unwrap());
    }

    #[tokio::test]
    async fn session_lifecycle_round_trips() {
        let store = store().await;
        let session = SessionId::new();
        let record = SessionRecord {
            session_id: session.to_string(),
            request_id: RequestId::new().to_string(),
            status: SessionStatus::Running.as_str().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            queries_emitted: 3,
            candidates_found: 0,
            duplicates_detected: 0,
            average_confidence_score: None,
        };
        store.create(&record).await.unwrap();

        store
            .finalize(
                session,
                SessionStatus::Completed,
                1,
                1,
                Some(Decimal::new(58, 2)),
                Utc::now(),
            )
            .await
            .unwrap();

        let stored = store.lookup_session(session).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), SessionStatus::Completed);
        assert_eq!(stored.candidates_found, 1);
        assert_eq!(stored.average_confidence_score.as_deref(), Some("0.58"));
    }

    #[tokio::test]
    async fn error_append_and_dead_letter_count() {
        let store = store().await;
        let session = SessionId::new();
        let event = WorkflowErrorEvent {
            request_id: RequestId::new(),
            session_id: session,
            stage: PipelineStage::Search,
            error_type: ErrorCategory::AdapterHttp5xx,
            error_message: "upstream 503".into(),
            retry_count: 3,
            original_payload: serde_json::json!({"query_text": "x"}),
            timestamp: Utc::now(),
        };
        store.append(&event, false).await.unwrap();
        store.append(&event, true).await.unwrap();
        assert_eq!(store.dead_letter_count(session).await.unwrap(), 1);
    }
}
