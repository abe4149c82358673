//! Pipeline event payloads (JSON on the wire).
//!
//! Field order in each struct is the canonical wire order. Events carry only
//! value data; entities are referenced by opaque identifiers.

use crate::ids::{RequestId, SessionId};
use crate::score::Score;
use crate::types::{
    ErrorCategory, FundingCategory, FundingType, PipelineStage, RecipientType, Region,
    SearchEngine,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The structured input accepted by the API trigger.
///
/// Immutable once created; `request_id` is allocated by the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub request_id: RequestId,
    pub category: FundingCategory,
    pub region: Region,
    pub funding_type: FundingType,
    pub recipient_type: RecipientType,
    pub engine: SearchEngine,
    pub created_at: DateTime<Utc>,
}

/// One generated query, published by the trigger on `search-requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequestEvent {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub query_text: String,
    pub engine: SearchEngine,
    pub category: FundingCategory,
    pub region: Region,
    pub funding_type: FundingType,
    pub recipient_type: RecipientType,
    pub timestamp: DateTime<Utc>,
}

/// One engine result inside a raw-results batch. URLs are unmodified; host
/// normalization happens in validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Engine-native ordering, 1-based.
    pub rank: u32,
    pub discovered_at: DateTime<Utc>,
}

/// All results from one `(request, engine)` search execution, published by
/// the request consumer on `search-results-raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultsRawEvent {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub engine: SearchEngine,
    pub results: Vec<RawResult>,
    pub total_results: u32,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// The DTO that traverses validation into scoring. Exists only between
/// stages; never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub engine: SearchEngine,
    pub rank: u32,
    pub discovered_at: DateTime<Utc>,
    pub session_id: SessionId,
    pub request_id: RequestId,
}

/// Per-batch validation accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationStats {
    pub total_in: u32,
    pub duplicates_dropped: u32,
    pub blacklisted_dropped: u32,
    pub registered_new: u32,
}

/// Surviving results of one batch, published by the validation consumer on
/// `search-results-validated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultsValidatedEvent {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub valid_results: Vec<SearchResult>,
    pub stats: ValidationStats,
    pub timestamp: DateTime<Utc>,
}

/// A batch-level failure, published by any stage on `workflow-errors`.
///
/// `original_payload` is the exact record payload the failing stage
/// consumed, re-published verbatim on retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowErrorEvent {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub stage: PipelineStage,
    pub error_type: ErrorCategory,
    pub error_message: String,
    pub retry_count: u32,
    pub original_payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl SearchResult {
    /// Lift a raw engine result into the pipeline DTO.
    pub fn from_raw(raw: &RawResult, event: &SearchResultsRawEvent) -> Self {
        Self {
            url: raw.url.clone(),
            title: raw.title.clone(),
            description: raw.description.clone(),
            engine: event.engine,
            rank: raw.rank,
            discovered_at: raw.discovered_at,
            session_id: event.session_id,
            request_id: event.request_id,
        }
    }
}

/// A candidate admitted by the scoring consumer, as handed to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDraft {
    pub domain_name: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub engine: SearchEngine,
    pub confidence_score: Score,
    pub session_id: SessionId,
    pub discovered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw_event() -> SearchResultsRawEvent {
        SearchResultsRawEvent {
            request_id: RequestId::nil(),
            session_id: SessionId::nil(),
            engine: SearchEngine::Searxng,
            results: vec![RawResult {
                url: "https://education.gov.bg/grants".into(),
                title: "Grants".into(),
                description: "STEM grants".into(),
                rank: 1,
                discovered_at: Utc::now(),
            }],
            total_results: 1,
            execution_time_ms: 42,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn raw_event_round_trips_json() {
        let event = sample_raw_event();
        let json = serde_json::to_string(&event).unwrap();
        let back: SearchResultsRawEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn dto_carries_flight_identity() {
        let event = sample_raw_event();
        let dto = SearchResult::from_raw(&event.results[0], &event);
        assert_eq!(dto.session_id, event.session_id);
        assert_eq!(dto.request_id, event.request_id);
        assert_eq!(dto.engine, SearchEngine::Searxng);
        assert_eq!(dto.rank, 1);
    }

    #[test]
    fn error_event_preserves_payload_verbatim() {
        let payload = serde_json::json!({"query_text": "x", "engine": "SEARXNG"});
        let event = WorkflowErrorEvent {
            request_id: RequestId::nil(),
            session_id: SessionId::nil(),
            stage: PipelineStage::Search,
            error_type: ErrorCategory::AdapterHttp5xx,
            error_message: "upstream 503".into(),
            retry_count: 1,
            original_payload: payload.clone(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: WorkflowErrorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.original_payload, payload);
        assert_eq!(back.retry_count, 1);
    }
}
