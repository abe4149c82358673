//! Shared protocol for the FundScout discovery pipeline.
//!
//! Defines the canonical enums, identifiers, fixed-point score type and the
//! JSON event payloads that traverse the four pipeline streams. Every stage
//! worker, the trigger and the error handler speak these types; nothing else
//! crosses a stream boundary.

pub mod defaults;
pub mod events;
pub mod ids;
pub mod partition;
pub mod score;
pub mod types;

// Re-export the canonical types for convenience
pub use events::{
    CandidateDraft,
    ExecutionRequest,
    RawResult,
    SearchRequestEvent,
    SearchResult,
    SearchResultsRawEvent,
    SearchResultsValidatedEvent,
    ValidationStats,
    WorkflowErrorEvent,
};
pub use ids::{CandidateId, RequestId, SessionId};
pub use partition::partition_key;
pub use score::{Score, ScoreBreakdown, ScoreError, ScoreWeights, SubScores};
pub use types::{
    CandidateStatus,
    DomainStatus,
    ErrorCategory,
    FundingCategory,
    FundingType,
    PipelineStage,
    RecipientType,
    Region,
    RegionError,
    SearchEngine,
    SessionDisposition,
    SessionStatus,
};
