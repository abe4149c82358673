//! Session orchestration.
//!
//! The orchestrator is the single mutator of session state: per-session
//! outstanding-flight counts, the session-scoped host dedup set and the
//! running statistics. When the last flight of a session lands (scored or
//! dead-lettered) the session is finalized and flushed to the session
//! repository; the in-memory dedup set is dropped with it. Reports for
//! finished sessions stay queryable for the status API.

use chrono::Utc;
use fundscout_protocol::{RequestId, Score, SessionDisposition, SessionId, SessionStatus};
use fundscout_registry::{RegistryError, SessionRecord, SessionRepository};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct SessionState {
    request_id: RequestId,
    outstanding: u64,
    queries_emitted: u64,
    seen_hosts: HashSet<String>,
    candidates_found: u64,
    duplicates_detected: u64,
    blacklisted_dropped: u64,
    sub_threshold: u64,
    scoring_dropped: u64,
    dead_letters: u64,
    score_sum: Decimal,
    score_count: u64,
}

/// Progress counters for one request, derived from the orchestrator's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStatus {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub disposition: SessionDisposition,
    pub queries_emitted: u64,
    pub outstanding: u64,
    pub candidates_found: u64,
    pub duplicates_detected: u64,
    pub blacklisted_dropped: u64,
    pub sub_threshold: u64,
    pub scoring_dropped: u64,
    pub dead_letters: u64,
    pub average_confidence: Option<Score>,
}

pub struct SessionOrchestrator {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
    by_request: Mutex<HashMap<RequestId, SessionId>>,
    finished: Mutex<HashMap<SessionId, RequestStatus>>,
    repository: Arc<dyn SessionRepository>,
}

impl SessionOrchestrator {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            by_request: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashMap::new()),
            repository,
        }
    }

    /// Open a session sized to the number of flights the trigger will
    /// publish, and persist the RUNNING record.
    pub async fn register_session(
        &self,
        session_id: SessionId,
        request_id: RequestId,
        flights: u64,
    ) -> Result<(), RegistryError> {
        let now = Utc::now();
        self.repository
            .create(&SessionRecord {
                session_id: session_id.to_string(),
                request_id: request_id.to_string(),
                status: SessionStatus::Running.as_str().to_string(),
                started_at: now,
                completed_at: None,
                queries_emitted: flights as i64,
                candidates_found: 0,
                duplicates_detected: 0,
                average_confidence_score: None,
            })
            .await?;

        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id,
            SessionState {
                request_id,
                outstanding: flights,
                queries_emitted: flights,
                seen_hosts: HashSet::new(),
                candidates_found: 0,
                duplicates_detected: 0,
                blacklisted_dropped: 0,
                sub_threshold: 0,
                scoring_dropped: 0,
                dead_letters: 0,
                score_sum: Decimal::ZERO,
                score_count: 0,
            },
        );
        self.by_request.lock().await.insert(request_id, session_id);
        info!(%session_id, %request_id, flights, "session registered");
        Ok(())
    }

    /// Some trigger publishes failed. Shrinks the expected flight count;
    /// with nothing published at all the session fails outright.
    pub async fn abort_unpublished(
        &self,
        session_id: SessionId,
        unpublished: u64,
    ) -> Result<(), RegistryError> {
        let finished = {
            let mut sessions = self.sessions.lock().await;
            let Some(state) = sessions.get_mut(&session_id) else {
                return Ok(());
            };
            state.outstanding = state.outstanding.saturating_sub(unpublished);
            state.queries_emitted = state.queries_emitted.saturating_sub(unpublished);
            state.outstanding == 0
        };
        if finished {
            self.finalize(session_id, Some(SessionStatus::Failed)).await?;
        }
        Ok(())
    }

    /// Force-fail a session that never got off the ground.
    pub async fn mark_failed(&self, session_id: SessionId) -> Result<(), RegistryError> {
        self.finalize(session_id, Some(SessionStatus::Failed)).await
    }

    // ------------------------------------------------------------------
    // Validation-stage accounting
    // ------------------------------------------------------------------

    /// Host already seen by this session's dedup set?
    pub async fn already_seen(&self, session_id: SessionId, host: &str) -> bool {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&session_id)
            .map(|s| s.seen_hosts.contains(host))
            .unwrap_or(false)
    }

    /// Commit a surviving batch's hosts into the session dedup set. Called
    /// once per batch, after the whole batch survived validation, so a
    /// failed batch never half-commits and a retried one re-enters cleanly.
    pub async fn commit_hosts(&self, session_id: SessionId, hosts: impl IntoIterator<Item = String>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get_mut(&session_id) {
            state.seen_hosts.extend(hosts);
        }
    }

    pub async fn record_duplicates(&self, session_id: SessionId, count: u64) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get_mut(&session_id) {
            state.duplicates_detected += count;
        }
    }

    pub async fn record_blacklisted(&self, session_id: SessionId, count: u64) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get_mut(&session_id) {
            state.blacklisted_dropped += count;
        }
    }

    // ------------------------------------------------------------------
    // Scoring-stage accounting
    // ------------------------------------------------------------------

    /// Fold one computed score into the session's running mean.
    pub async fn record_score(&self, session_id: SessionId, score: Score, admitted: bool) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get_mut(&session_id) {
            state.score_sum += score.as_decimal();
            state.score_count += 1;
            if !admitted {
                state.sub_threshold += 1;
            }
        }
    }

    pub async fn record_candidate(&self, session_id: SessionId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get_mut(&session_id) {
            state.candidates_found += 1;
        }
    }

    pub async fn record_scoring_dropped(&self, session_id: SessionId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get_mut(&session_id) {
            state.scoring_dropped += 1;
        }
    }

    /// One flight fully scored. Finalizes the session when it was the last
    /// outstanding flight.
    pub async fn complete_flight(&self, session_id: SessionId) -> Result<(), RegistryError> {
        let finished = {
            let mut sessions = self.sessions.lock().await;
            let Some(state) = sessions.get_mut(&session_id) else {
                warn!(%session_id, "flight completion for unknown session");
                return Ok(());
            };
            state.outstanding = state.outstanding.saturating_sub(1);
            state.outstanding == 0
        };
        if finished {
            self.finalize(session_id, None).await?;
        }
        Ok(())
    }

    /// One flight dead-lettered; it will never be scored.
    pub async fn record_dead_letter(&self, session_id: SessionId) -> Result<(), RegistryError> {
        let finished = {
            let mut sessions = self.sessions.lock().await;
            let Some(state) = sessions.get_mut(&session_id) else {
                warn!(%session_id, "dead letter for unknown session");
                return Ok(());
            };
            state.dead_letters += 1;
            state.outstanding = state.outstanding.saturating_sub(1);
            state.outstanding == 0
        };
        if finished {
            self.finalize(session_id, None).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub async fn status(&self, request_id: RequestId) -> Option<RequestStatus> {
        let session_id = *self.by_request.lock().await.get(&request_id)?;
        {
            let sessions = self.sessions.lock().await;
            if let Some(state) = sessions.get(&session_id) {
                return Some(state.report(session_id, SessionDisposition::Running));
            }
        }
        self.finished.lock().await.get(&session_id).cloned()
    }

    async fn finalize(
        &self,
        session_id: SessionId,
        forced: Option<SessionStatus>,
    ) -> Result<(), RegistryError> {
        let Some(state) = self.sessions.lock().await.remove(&session_id) else {
            return Ok(());
        };

        let status = forced.unwrap_or({
            // A dead-lettered flight fails the session only when nothing
            // produced a candidate.
            if state.dead_letters > 0 && state.candidates_found == 0 {
                SessionStatus::Failed
            } else {
                SessionStatus::Completed
            }
        });
        let disposition = match status {
            SessionStatus::Failed => SessionDisposition::Failed,
            SessionStatus::Completed if state.dead_letters > 0 => SessionDisposition::Partial,
            SessionStatus::Completed => SessionDisposition::Completed,
            SessionStatus::Running => SessionDisposition::Running,
        };

        let average = state.average();
        self.repository
            .finalize(
                session_id,
                status,
                state.candidates_found,
                state.duplicates_detected,
                average.map(|s| s.as_decimal()),
                Utc::now(),
            )
            .await?;

        info!(
            %session_id,
            status = %status,
            disposition = %disposition,
            candidates = state.candidates_found,
            duplicates = state.duplicates_detected,
            dead_letters = state.dead_letters,
            "session finalized"
        );

        let report = state.report(session_id, disposition);
        self.finished.lock().await.insert(session_id, report);
        Ok(())
    }
}

impl SessionState {
    fn average(&self) -> Option<Score> {
        if self.score_count == 0 {
            return None;
        }
        let mean = (self.score_sum / Decimal::from(self.score_count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Score::new(mean).ok()
    }

    fn report(&self, session_id: SessionId, disposition: SessionDisposition) -> RequestStatus {
        RequestStatus {
            request_id: self.request_id,
            session_id,
            disposition,
            queries_emitted: self.queries_emitted,
            outstanding: self.outstanding,
            candidates_found: self.candidates_found,
            duplicates_detected: self.duplicates_detected,
            blacklisted_dropped: self.blacklisted_dropped,
            sub_threshold: self.sub_threshold,
            scoring_dropped: self.scoring_dropped,
            dead_letters: self.dead_letters,
            average_confidence: self.average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundscout_registry::{ensure_schema, SqliteStore};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn orchestrator() -> (SessionOrchestrator, SqliteStore) {
        let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();
        let store = SqliteStore::new(pool);
        (
            SessionOrchestrator::new(Arc::new(store.clone())),
            store,
        )
    }

    fn s(text: &str) -> Score {
        text.parse().unwrap()
    }

    #[tokio::test]
    async fn session_completes_when_all_flights_land() {
        let (orch, store) = orchestrator().await;
        let session = SessionId::new();
        let request = RequestId::new();
        orch.register_session(session, request, 2)
            .await
            .unwrap();

        orch.record_score(session, s("0.95"), true).await;
        orch.record_candidate(session).await;
        orch.complete_flight(session).await.unwrap();

        let status = orch.status(request).await.unwrap();
        assert_eq!(status.disposition, SessionDisposition::Running);
        assert_eq!(status.outstanding, 1);

        orch.record_score(session, s("0.20"), false).await;
        orch.complete_flight(session).await.unwrap();

        let status = orch.status(request).await.unwrap();
        assert_eq!(status.disposition, SessionDisposition::Completed);
        assert_eq!(status.outstanding, 0);
        assert_eq!(status.candidates_found, 1);
        assert_eq!(status.sub_threshold, 1);
        // mean of 0.95 and 0.20 rounded half-up
        assert_eq!(status.average_confidence, Some(s("0.58")));

        let record = store.lookup_session(session).await.unwrap().unwrap();
        assert_eq!(record.status().unwrap(), SessionStatus::Completed);
        assert_eq!(record.candidates_found, 1);
    }

    #[tokio::test]
    async fn dead_letters_without_candidates_fail_the_session() {
        let (orch, _store) = orchestrator().await;
        let session = SessionId::new();
        let request = RequestId::new();
        orch.register_session(session, request, 1)
            .await
            .unwrap();

        orch.record_dead_letter(session).await.unwrap();
        let status = orch.status(request).await.unwrap();
        assert_eq!(status.disposition, SessionDisposition::Failed);
        assert_eq!(status.dead_letters, 1);
    }

    #[tokio::test]
    async fn dead_letters_alongside_candidates_are_partial() {
        let (orch, _store) = orchestrator().await;
        let session = SessionId::new();
        let request = RequestId::new();
        orch.register_session(session, request, 2)
            .await
            .unwrap();

        orch.record_score(session, s("0.80"), true).await;
        orch.record_candidate(session).await;
        orch.complete_flight(session).await.unwrap();
        orch.record_dead_letter(session).await.unwrap();

        let status = orch.status(request).await.unwrap();
        assert_eq!(status.disposition, SessionDisposition::Partial);
        assert_eq!(status.candidates_found, 1);
    }

    #[tokio::test]
    async fn dedup_set_is_session_scoped_and_cleared_on_finalize() {
        let (orch, _store) = orchestrator().await;
        let a = SessionId::new();
        let b = SessionId::new();
        orch.register_session(a, RequestId::new(), 1)
            .await
            .unwrap();
        orch.register_session(b, RequestId::new(), 1)
            .await
            .unwrap();

        orch.commit_hosts(a, vec!["us-bulgaria.org".to_string()]).await;
        assert!(orch.already_seen(a, "us-bulgaria.org").await);
        assert!(!orch.already_seen(b, "us-bulgaria.org").await);

        orch.complete_flight(a).await.unwrap();
        // Finalized session no longer tracks hosts.
        assert!(!orch.already_seen(a, "us-bulgaria.org").await);
    }

    #[tokio::test]
    async fn zero_published_flights_fail_outright() {
        let (orch, store) = orchestrator().await;
        let session = SessionId::new();
        let request = RequestId::new();
        orch.register_session(session, request, 3)
            .await
            .unwrap();
        orch.abort_unpublished(session, 3).await.unwrap();

        let status = orch.status(request).await.unwrap();
        assert_eq!(status.disposition, SessionDisposition::Failed);
        let record = store.lookup_session(session).await.unwrap().unwrap();
        assert_eq!(record.status().unwrap(), SessionStatus::Failed);
    }
}
