//! Stage 2: host extraction, session dedup, blacklist filtering, registry
//! sightings.

use crate::orchestrator::SessionOrchestrator;
use crate::runtime::StageWorker;
use async_trait::async_trait;
use chrono::Utc;
use fundscout_protocol::defaults::VALIDATION_STAGE_DEADLINE;
use fundscout_protocol::{
    ErrorCategory, PipelineStage, SearchResult, SearchResultsRawEvent,
    SearchResultsValidatedEvent, ValidationStats, WorkflowErrorEvent,
};
use fundscout_registry::{BlacklistCache, DomainRegistry, RegistryError};
use fundscout_stream::{Publisher, StreamRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub struct ValidationStage {
    orchestrator: Arc<SessionOrchestrator>,
    blacklist: Arc<BlacklistCache>,
    registry: DomainRegistry,
    validated: Publisher,
    errors: Publisher,
    deadline: Duration,
}

impl ValidationStage {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        blacklist: Arc<BlacklistCache>,
        registry: DomainRegistry,
        validated: Publisher,
        errors: Publisher,
    ) -> Self {
        Self {
            orchestrator,
            blacklist,
            registry,
            validated,
            errors,
            deadline: VALIDATION_STAGE_DEADLINE,
        }
    }

    async fn validate(
        &self,
        event: &SearchResultsRawEvent,
    ) -> Result<SearchResultsValidatedEvent, RegistryError> {
        let mut stats = ValidationStats {
            total_in: event.results.len() as u32,
            ..Default::default()
        };
        let mut surviving = Vec::new();
        // Hosts accepted from this batch; committed to the session set only
        // once the whole batch survives.
        let mut batch_hosts: HashSet<String> = HashSet::new();

        for raw in &event.results {
            // Unparsable URLs are dropped without ceremony; a ranked result
            // is not worth an error-stream event.
            let Some(host) = extract_host(&raw.url) else {
                debug!(url = %raw.url, "dropping result with unusable url");
                continue;
            };

            if batch_hosts.contains(&host)
                || self.orchestrator.already_seen(event.session_id, &host).await
            {
                stats.duplicates_dropped += 1;
                continue;
            }

            if self.blacklist.is_blacklisted(&host).await? {
                stats.blacklisted_dropped += 1;
                continue;
            }

            if self.registry.record_sighting(&host).await? {
                stats.registered_new += 1;
            }

            batch_hosts.insert(host);
            surviving.push(SearchResult::from_raw(raw, event));
        }

        self.orchestrator
            .record_duplicates(event.session_id, stats.duplicates_dropped as u64)
            .await;
        self.orchestrator
            .record_blacklisted(event.session_id, stats.blacklisted_dropped as u64)
            .await;
        self.orchestrator
            .commit_hosts(event.session_id, batch_hosts)
            .await;

        Ok(SearchResultsValidatedEvent {
            request_id: event.request_id,
            session_id: event.session_id,
            valid_results: surviving,
            stats,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl StageWorker for ValidationStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Validation
    }

    async fn handle(&self, record: StreamRecord) {
        let event: SearchResultsRawEvent = match serde_json::from_value(record.payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                error!(key = %record.key, error = %err, "malformed raw results event");
                return;
            }
        };

        let outcome = tokio::time::timeout(self.deadline, self.validate(&event)).await;
        let (category, message) = match outcome {
            Ok(Ok(validated_event)) => {
                debug!(
                    request_id = %event.request_id,
                    total_in = validated_event.stats.total_in,
                    surviving = validated_event.valid_results.len(),
                    duplicates = validated_event.stats.duplicates_dropped,
                    blacklisted = validated_event.stats.blacklisted_dropped,
                    "batch validated"
                );
                if let Err(err) = self.validated.publish(&record.key, &validated_event).await {
                    error!(error = %err, "failed to publish validated results");
                }
                return;
            }
            Ok(Err(err)) => (categorize_registry(&err), err.to_string()),
            Err(_) => (
                ErrorCategory::StageTimeout,
                format!("validation exceeded {:?}", self.deadline),
            ),
        };

        warn!(
            request_id = %event.request_id,
            category = %category,
            attempt = record.attempt,
            "validation failed, routing to error stream"
        );
        let error_event = WorkflowErrorEvent {
            request_id: event.request_id,
            session_id: event.session_id,
            stage: PipelineStage::Validation,
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

pub(crate) fn categorize_registry(err: &RegistryError) -> ErrorCategory {
    match err {
        RegistryError::Contention { .. } => ErrorCategory::RegistryContention,
        _ => ErrorCategory::StageFatal,
    }
}

/// Standard URI parsing; host lowercased, `www.` left as-is.
pub(crate) fn extract_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_lowercases_and_keeps_www() {
        assert_eq!(
            extract_host("https://Education.GOV.bg/grants"),
            Some("education.gov.bg".to_string())
        );
        assert_eq!(
            extract_host("https://www.us-bulgaria.org/a"),
            Some("www.us-bulgaria.org".to_string())
        );
        assert_eq!(extract_host("not a url"), None);
        assert_eq!(extract_host("mailto:x@y.z"), None);
    }
}
