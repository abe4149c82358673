//! Stage 4: the error handler.
//!
//! Every workflow error is persisted. Transient categories under the retry
//! ceiling are re-published to their stage's input stream after an
//! exponential backoff; everything else dead-letters, which is terminal for
//! the owning flight.

use crate::orchestrator::SessionOrchestrator;
use crate::runtime::StageWorker;
use async_trait::async_trait;
use fundscout_protocol::defaults::{
    ERROR_BACKOFF_BASE_MS, ERROR_BACKOFF_CAP_MS, ERROR_MAX_RETRIES,
};
use fundscout_protocol::{PipelineStage, WorkflowErrorEvent};
use fundscout_registry::ErrorRepository;
use fundscout_stream::{Publisher, StreamRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct ErrorStage {
    orchestrator: Arc<SessionOrchestrator>,
    repository: Arc<dyn ErrorRepository>,
    /// Re-publish targets: each stage's input stream.
    stage_inputs: HashMap<PipelineStage, Publisher>,
}

impl ErrorStage {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        repository: Arc<dyn ErrorRepository>,
        stage_inputs: HashMap<PipelineStage, Publisher>,
    ) -> Self {
        Self {
            orchestrator,
            repository,
            stage_inputs,
        }
    }

    /// Backoff before a re-publish: 200 ms * 2^retry, capped at 8 s.
    fn retry_delay(retry_count: u32) -> Duration {
        let ms = ERROR_BACKOFF_BASE_MS
            .saturating_mul(1u64 << retry_count.min(16))
            .min(ERROR_BACKOFF_CAP_MS);
        Duration::from_millis(ms)
    }

    async fn retry(&self, record: &StreamRecord, event: &WorkflowErrorEvent) {
        let Some(publisher) = self.stage_inputs.get(&event.stage) else {
            error!(stage = %event.stage, "no input stream wired for stage");
            return;
        };
        let publisher = publisher.clone();
        let key = record.key.clone();
        let payload = event.original_payload.clone();
        let next_attempt = event.retry_count + 1;
        let delay = Self::retry_delay(event.retry_count);

        info!(
            request_id = %event.request_id,
            stage = %event.stage,
            next_attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = publisher.publish_raw(&key, next_attempt, payload).await {
                error!(error = %err, "retry publish failed");
            }
        });
    }
}

#[async_trait]
impl StageWorker for ErrorStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::ErrorHandling
    }

    async fn handle(&self, record: StreamRecord) {
        let event: WorkflowErrorEvent = match serde_json::from_value(record.payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                error!(key = %record.key, error = %err, "malformed workflow error event");
                return;
            }
        };

        let retryable = event.error_type.is_transient() && event.retry_count < ERROR_MAX_RETRIES;

        if let Err(err) = self.repository.append(&event, !retryable).await {
            error!(error = %err, "failed to persist workflow error");
        }

        if retryable {
            self.retry(&record, &event).await;
        } else {
            warn!(
                request_id = %event.request_id,
                stage = %event.stage,
                category = %event.error_type,
                retries = event.retry_count,
                "dead-lettering flight"
            );
            if let Err(err) = self.orchestrator.record_dead_letter(event.session_id).await {
                error!(error = %err, "failed to account dead letter");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(ErrorStage::retry_delay(0), Duration::from_millis(200));
        assert_eq!(ErrorStage::retry_delay(1), Duration::from_millis(400));
        assert_eq!(ErrorStage::retry_delay(2), Duration::from_millis(800));
        assert_eq!(ErrorStage::retry_delay(5), Duration::from_millis(6_400));
        assert_eq!(ErrorStage::retry_delay(6), Duration::from_millis(8_000));
        assert_eq!(ErrorStage::retry_delay(60), Duration::from_millis(8_000));
    }
}
