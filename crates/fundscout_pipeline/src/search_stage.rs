//! Stage 1: execute searches through the engine adapters.

use crate::runtime::StageWorker;
use async_trait::async_trait;
use chrono::Utc;
use fundscout_protocol::defaults::SEARCH_STAGE_DEADLINE;
use fundscout_protocol::{
    ErrorCategory, PipelineStage, RawResult, RequestId, SearchRequestEvent, SearchResultsRawEvent,
    SessionId, WorkflowErrorEvent,
};
use fundscout_search::AdapterRegistry;
use fundscout_stream::{Publisher, StreamRecord};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub struct SearchStage {
    adapters: AdapterRegistry,
    raw_results: Publisher,
    errors: Publisher,
    max_results: usize,
    deadline: Duration,
}

impl SearchStage {
    pub fn new(
        adapters: AdapterRegistry,
        raw_results: Publisher,
        errors: Publisher,
        max_results: usize,
    ) -> Self {
        Self {
            adapters,
            raw_results,
            errors,
            max_results,
            deadline: SEARCH_STAGE_DEADLINE,
        }
    }

    async fn execute(
        &self,
        event: &SearchRequestEvent,
    ) -> Result<SearchResultsRawEvent, StageFailure> {
        let adapter = self
            .adapters
            .get(event.engine)
            .map_err(|e| StageFailure::new(e.category(), e.to_string()))?;

        let started = Instant::now();
        let engine_results =
            tokio::time::timeout(self.deadline, adapter.search(&event.query_text, self.max_results))
                .await
                .map_err(|_| {
                    StageFailure::new(
                        ErrorCategory::StageTimeout,
                        format!("search exceeded {:?}", self.deadline),
                    )
                })?
                .map_err(|e| StageFailure::new(e.category(), e.to_string()))?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let now = Utc::now();
        let results: Vec<RawResult> = engine_results
            .into_iter()
            .map(|r| RawResult {
                url: r.url,
                title: r.title,
                description: r.description,
                rank: r.rank,
                discovered_at: now,
            })
            .collect();

        Ok(SearchResultsRawEvent {
            request_id: event.request_id,
            session_id: event.session_id,
            engine: event.engine,
            total_results: results.len() as u32,
            results,
            execution_time_ms,
            timestamp: now,
        })
    }
}

/// A batch-level failure with the category the error handler routes on.
struct StageFailure {
    category: ErrorCategory,
    message: String,
}

impl StageFailure {
    fn new(category: ErrorCategory, message: String) -> Self {
        Self { category, message }
    }
}

#[async_trait]
impl StageWorker for SearchStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Search
    }

    async fn handle(&self, record: StreamRecord) {
        let event: SearchRequestEvent = match serde_json::from_value(record.payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                self.reject_malformed(&record, err.to_string()).await;
                return;
            }
        };

        match self.execute(&event).await {
            Ok(raw_event) => {
                debug!(
                    request_id = %event.request_id,
                    query = %event.query_text,
                    results = raw_event.total_results,
                    time_ms = raw_event.execution_time_ms,
                    "search executed"
                );
                if let Err(err) = self.raw_results.publish(&record.key, &raw_event).await {
                    error!(error = %err, "failed to publish raw results");
                }
            }
            Err(failure) => {
                info!(
                    request_id = %event.request_id,
                    category = %failure.category,
                    attempt = record.attempt,
                    "search failed, routing to error stream"
                );
                let error_event = WorkflowErrorEvent {
                    request_id: event.request_id,
                    session_id: event.session_id,
                    stage: PipelineStage::Search,
                    error_type: failure.category,
                    error_message: failure.message,
                    retry_count: record.attempt,
                    original_payload: record.payload.clone(),
                    timestamp: Utc::now(),
                };
                if let Err(err) = self.errors.publish(&record.key, &error_event).await {
                    error!(error = %err, "failed to publish workflow error");
                }
            }
        }
    }
}

impl SearchStage {
    async fn reject_malformed(&self, record: &StreamRecord, message: String) {
        error!(key = %record.key, message = %message, "malformed search request event");
        let error_event = WorkflowErrorEvent {
            request_id: RequestId::nil(),
            session_id: SessionId::nil(),
            stage: PipelineStage::Search,
            error_type: ErrorCategory::StageFatal,
            error_message: format!("malformed event: {}", message),
            retry_count: record.attempt,
            original_payload: record.payload.clone(),
            timestamp: Utc::now(),
        };
        if let Err(err) = self.errors.publish(&record.key, &error_event).await {
            error!(error = %err, "failed to publish workflow error");
        }
    }
}
