//! The request trigger: the only producer of the `search-requests` stream.

use crate::generator::{QueryGenerator, QueryGeneratorError};
use crate::orchestrator::SessionOrchestrator;
use chrono::Utc;
use fundscout_protocol::defaults::TRIGGER_DEADLINE;
use fundscout_protocol::{
    partition_key, ErrorCategory, ExecutionRequest, FundingCategory, FundingType, PipelineStage,
    RecipientType, Region, RequestId, SearchEngine, SearchRequestEvent, SessionId,
    WorkflowErrorEvent,
};
use fundscout_registry::RegistryError;
use fundscout_stream::Publisher;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Validated trigger input. Field parsing (closed enumerations, ISO region)
/// happens on the way in; an `ExecutionRequest` is allocated per call.
#[derive(Debug, Clone)]
pub struct TriggerInput {
    pub category: FundingCategory,
    pub region: Region,
    pub funding_type: FundingType,
    pub recipient_type: RecipientType,
    pub engine: SearchEngine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReceipt {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub queries_emitted: u32,
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Generator(#[from] QueryGeneratorError),
    #[error("query generation exceeded the trigger deadline")]
    Deadline,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct RequestTrigger {
    generator: Arc<dyn QueryGenerator>,
    orchestrator: Arc<SessionOrchestrator>,
    requests: Publisher,
    errors: Publisher,
}

impl RequestTrigger {
    pub fn new(
        generator: Arc<dyn QueryGenerator>,
        orchestrator: Arc<SessionOrchestrator>,
        requests: Publisher,
        errors: Publisher,
    ) -> Self {
        Self {
            generator,
            orchestrator,
            requests,
            errors,
        }
    }

    /// Synchronous half of the pipeline: validate, generate, fan out.
    ///
    /// Generator failure (or deadline) fails the whole call with no session
    /// recorded. Partial publish failure emits a workflow error per
    /// unpublished query and succeeds for the rest; the session fails only
    /// when nothing at all was published.
    pub async fn execute(&self, input: TriggerInput) -> Result<TriggerReceipt, TriggerError> {
        let request = ExecutionRequest {
            request_id: RequestId::new(),
            category: input.category,
            region: input.region,
            funding_type: input.funding_type,
            recipient_type: input.recipient_type,
            engine: input.engine,
            created_at: Utc::now(),
        };

        let queries = tokio::time::timeout(TRIGGER_DEADLINE, self.generator.generate(&request))
            .await
            .map_err(|_| TriggerError::Deadline)??;

        let session_id = SessionId::new();
        self.orchestrator
            .register_session(session_id, request.request_id, queries.len() as u64)
            .await?;

        if queries.is_empty() {
            warn!(request_id = %request.request_id, "generator produced no queries");
            self.orchestrator.mark_failed(session_id).await?;
            return Ok(TriggerReceipt {
                request_id: request.request_id,
                session_id,
                queries_emitted: 0,
            });
        }

        let key = partition_key(session_id, request.request_id, request.engine);
        let mut published = 0u32;
        // Flights the error stream will never account for (double publish
        // failure); these are deducted from the session directly.
        let mut unaccounted = 0u64;
        for query_text in &queries {
            let event = SearchRequestEvent {
                request_id: request.request_id,
                session_id,
                query_text: query_text.clone(),
                engine: request.engine,
                category: request.category,
                region: request.region.clone(),
                funding_type: request.funding_type,
                recipient_type: request.recipient_type,
                timestamp: Utc::now(),
            };
            match self.requests.publish(&key, &event).await {
                Ok(_) => published += 1,
                Err(err) => {
                    error!(
                        request_id = %request.request_id,
                        query = %query_text,
                        error = %err,
                        "failed to publish search request"
                    );
                    let error_event = WorkflowErrorEvent {
                        request_id: request.request_id,
                        session_id,
                        stage: PipelineStage::Search,
                        error_type: ErrorCategory::StageFatal,
                        error_message: format!("unpublished query: {}", err),
                        retry_count: 0,
                        original_payload: serde_json::to_value(&event)
                            .unwrap_or(serde_json::Value::Null),
                        timestamp: Utc::now(),
                    };
                    if let Err(err) = self.errors.publish(&key, &error_event).await {
                        error!(error = %err, "error stream publish failed as well");
                        unaccounted += 1;
                    }
                }
            }
        }

        if unaccounted > 0 {
            self.orchestrator
                .abort_unpublished(session_id, unaccounted)
                .await?;
        }

        info!(
            request_id = %request.request_id,
            %session_id,
            published,
            "trigger accepted"
        );
        Ok(TriggerReceipt {
            request_id: request.request_id,
            session_id,
            queries_emitted: published,
        })
    }
}
