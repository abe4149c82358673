//! Stage 3: confidence scoring, candidate creation, session statistics.

use crate::orchestrator::SessionOrchestrator;
use crate::runtime::StageWorker;
use crate::validation_stage::{categorize_registry, extract_host};
use async_trait::async_trait;
use chrono::Utc;
use fundscout_protocol::defaults::SCORING_STAGE_DEADLINE;
use fundscout_protocol::{
    CandidateDraft, CandidateId, ErrorCategory, PipelineStage, SearchResult,
    SearchResultsValidatedEvent, WorkflowErrorEvent,
};
use fundscout_registry::{CandidateRepository, DomainRegistry, RegistryError};
use fundscout_scoring::{ConfidenceScorer, ScoringError};
use fundscout_stream::{Publisher, StreamRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct ScoringStage {
    orchestrator: Arc<SessionOrchestrator>,
    scorer: Arc<ConfidenceScorer>,
    registry: DomainRegistry,
    candidates: Arc<dyn CandidateRepository>,
    errors: Publisher,
    deadline: Duration,
}

impl ScoringStage {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        scorer: Arc<ConfidenceScorer>,
        registry: DomainRegistry,
        candidates: Arc<dyn CandidateRepository>,
        errors: Publisher,
    ) -> Self {
        Self {
            orchestrator,
            scorer,
            registry,
            candidates,
            errors,
            deadline: SCORING_STAGE_DEADLINE,
        }
    }

    async fn judge(&self, result: &SearchResult) -> Result<(), RegistryError> {
        let breakdown = match self
            .scorer
            .score(&result.url, &result.title, &result.description)
        {
            Ok(breakdown) => breakdown,
            Err(ScoringError::InvalidInput(reason)) => {
                // Single-result failure: dropped silently, counters only.
                debug!(url = %result.url, reason = %reason, "result unusable for scoring");
                self.orchestrator
                    .record_scoring_dropped(result.session_id)
                    .await;
                return Ok(());
            }
            Err(ScoringError::Score(err)) => {
                return Err(RegistryError::Corrupt(err.to_string()));
            }
        };

        let Some(host) = extract_host(&result.url) else {
            self.orchestrator
                .record_scoring_dropped(result.session_id)
                .await;
            return Ok(());
        };

        let score = breakdown.aggregate;
        let admitted = score.passes_threshold();
        self.orchestrator
            .record_score(result.session_id, score, admitted)
            .await;

        if admitted {
            let draft = CandidateDraft {
                domain_name: host.clone(),
                url: result.url.clone(),
                title: result.title.clone(),
                description: result.description.clone(),
                engine: result.engine,
                confidence_score: score,
                session_id: result.session_id,
                discovered_at: result.discovered_at,
            };
            let created = self.candidates.save(CandidateId::new(), &draft).await?;
            if created {
                self.orchestrator.record_candidate(result.session_id).await;
                info!(
                    host = %host,
                    url = %result.url,
                    score = %score,
                    "candidate created"
                );
            } else {
                debug!(url = %result.url, "candidate already persisted, skipping");
            }
        }

        self.registry.record_judgement(&host, score).await?;
        Ok(())
    }

    async fn process(&self, event: &SearchResultsValidatedEvent) -> Result<(), RegistryError> {
        for result in &event.valid_results {
            self.judge(result).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StageWorker for ScoringStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Scoring
    }

    async fn handle(&self, record: StreamRecord) {
        let event: SearchResultsValidatedEvent =
            match serde_json::from_value(record.payload.clone()) {
                Ok(event) => event,
                Err(err) => {
                    error!(key = %record.key, error = %err, "malformed validated results event");
                    return;
                }
            };

        let outcome = tokio::time::timeout(self.deadline, self.process(&event)).await;
        let (category, message) = match outcome {
            Ok(Ok(())) => {
                // This flight is done; the session may be too.
                if let Err(err) = self.orchestrator.complete_flight(event.session_id).await {
                    error!(error = %err, "failed to finalize session");
                }
                return;
            }
            Ok(Err(err)) => (categorize_registry(&err), err.to_string()),
            Err(_) => (
                ErrorCategory::StageTimeout,
                format!("scoring exceeded {:?}", self.deadline),
            ),
        };

        warn!(
            request_id = %event.request_id,
            category = %category,
            attempt = record.attempt,
            "scoring failed, routing to error stream"
        );
        let error_event = WorkflowErrorEvent {
            request_id: event.request_id,
            session_id: event.session_id,
            stage: PipelineStage::Scoring,
            error_type: category,
            error_message: message,
            retry_count: record.attempt,
            original_payload: record.payload.clone(),
            timestamp: Utc::now(),
        };
        if let Err(err) = self.errors.publish(&record.key, &error_event).await {
            error!(error = %err, "failed to publish workflow error");
        }
    }
}
