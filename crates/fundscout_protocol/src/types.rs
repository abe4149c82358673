//! Canonical enums used across all crates.
//!
//! Every enum here is a closed set. String forms are stable wire/database
//! contract: `as_str` is what gets persisted and published, `FromStr` accepts
//! exactly those forms (case-insensitive).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Search Engines
// ============================================================================

/// External search providers the pipeline can execute against.
///
/// Dispatch key for the adapter registry. One concrete engine today; the
/// registry and events are keyed by this enum so further engines slot in
/// without touching the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchEngine {
    /// Self-hosted SearXNG metasearch endpoint.
    #[default]
    Searxng,
}

impl SearchEngine {
    pub const ALL: &'static [SearchEngine] = &[SearchEngine::Searxng];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEngine::Searxng => "SEARXNG",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SearchEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SEARXNG" => Ok(SearchEngine::Searxng),
            _ => Err(format!("Unknown search engine: '{}'", s)),
        }
    }
}

// ============================================================================
// Request Field Enums
// ============================================================================

/// Funding category an execution request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundingCategory {
    Education,
    Health,
    Environment,
    Culture,
    CivilSociety,
    Research,
}

impl FundingCategory {
    pub const ALL: &'static [FundingCategory] = &[
        FundingCategory::Education,
        FundingCategory::Health,
        FundingCategory::Environment,
        FundingCategory::Culture,
        FundingCategory::CivilSociety,
        FundingCategory::Research,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FundingCategory::Education => "EDUCATION",
            FundingCategory::Health => "HEALTH",
            FundingCategory::Environment => "ENVIRONMENT",
            FundingCategory::Culture => "CULTURE",
            FundingCategory::CivilSociety => "CIVIL_SOCIETY",
            FundingCategory::Research => "RESEARCH",
        }
    }

    /// Human phrase used by the template query generator.
    pub fn phrase(&self) -> &'static str {
        match self {
            FundingCategory::Education => "education",
            FundingCategory::Health => "health",
            FundingCategory::Environment => "environment",
            FundingCategory::Culture => "culture",
            FundingCategory::CivilSociety => "civil society",
            FundingCategory::Research => "research",
        }
    }
}

impl fmt::Display for FundingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FundingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EDUCATION" => Ok(FundingCategory::Education),
            "HEALTH" => Ok(FundingCategory::Health),
            "ENVIRONMENT" => Ok(FundingCategory::Environment),
            "CULTURE" => Ok(FundingCategory::Culture),
            "CIVIL_SOCIETY" => Ok(FundingCategory::CivilSociety),
            "RESEARCH" => Ok(FundingCategory::Research),
            _ => Err(format!("Unknown funding category: '{}'", s)),
        }
    }
}

/// Kind of funding instrument being searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundingType {
    Scholarship,
    Grant,
    Donation,
    Sponsorship,
    Loan,
}

impl FundingType {
    pub const ALL: &'static [FundingType] = &[
        FundingType::Scholarship,
        FundingType::Grant,
        FundingType::Donation,
        FundingType::Sponsorship,
        FundingType::Loan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FundingType::Scholarship => "SCHOLARSHIP",
            FundingType::Grant => "GRANT",
            FundingType::Donation => "DONATION",
            FundingType::Sponsorship => "SPONSORSHIP",
            FundingType::Loan => "LOAN",
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            FundingType::Scholarship => "scholarships",
            FundingType::Grant => "grants",
            FundingType::Donation => "donations",
            FundingType::Sponsorship => "sponsorships",
            FundingType::Loan => "loans",
        }
    }
}

impl fmt::Display for FundingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FundingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SCHOLARSHIP" => Ok(FundingType::Scholarship),
            "GRANT" => Ok(FundingType::Grant),
            "DONATION" => Ok(FundingType::Donation),
            "SPONSORSHIP" => Ok(FundingType::Sponsorship),
            "LOAN" => Ok(FundingType::Loan),
            _ => Err(format!("Unknown funding type: '{}'", s)),
        }
    }
}

/// Who the funding is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    K12School,
    University,
    Nonprofit,
    Municipality,
    Individual,
    Startup,
}

impl RecipientType {
    pub const ALL: &'static [RecipientType] = &[
        RecipientType::K12School,
        RecipientType::University,
        RecipientType::Nonprofit,
        RecipientType::Municipality,
        RecipientType::Individual,
        RecipientType::Startup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientType::K12School => "K12_SCHOOL",
            RecipientType::University => "UNIVERSITY",
            RecipientType::Nonprofit => "NONPROFIT",
            RecipientType::Municipality => "MUNICIPALITY",
            RecipientType::Individual => "INDIVIDUAL",
            RecipientType::Startup => "STARTUP",
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            RecipientType::K12School => "schools",
            RecipientType::University => "universities",
            RecipientType::Nonprofit => "nonprofit organizations",
            RecipientType::Municipality => "municipalities",
            RecipientType::Individual => "individuals",
            RecipientType::Startup => "startups",
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecipientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "K12_SCHOOL" => Ok(RecipientType::K12School),
            "UNIVERSITY" => Ok(RecipientType::University),
            "NONPROFIT" => Ok(RecipientType::Nonprofit),
            "MUNICIPALITY" => Ok(RecipientType::Municipality),
            "INDIVIDUAL" => Ok(RecipientType::Individual),
            "STARTUP" => Ok(RecipientType::Startup),
            _ => Err(format!("Unknown recipient type: '{}'", s)),
        }
    }
}

/// ISO 3166-1 alpha-2 region code, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid ISO 3166-1 alpha-2 region: '{0}'")]
pub struct RegionError(pub String);

impl Region {
    pub fn new(code: &str) -> Result<Self, RegionError> {
        let trimmed = code.trim();
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(RegionError(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::new(s)
    }
}

impl TryFrom<String> for Region {
    type Error = RegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Region::new(&value)
    }
}

impl From<Region> for String {
    fn from(value: Region) -> Self {
        value.0
    }
}

// ============================================================================
// Pipeline Stages
// ============================================================================

/// The four pipeline stages a workflow error can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Search,
    Validation,
    Scoring,
    ErrorHandling,
}

impl PipelineStage {
    pub const ALL: &'static [PipelineStage] = &[
        PipelineStage::Search,
        PipelineStage::Validation,
        PipelineStage::Scoring,
        PipelineStage::ErrorHandling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Search => "SEARCH",
            PipelineStage::Validation => "VALIDATION",
            PipelineStage::Scoring => "SCORING",
            PipelineStage::ErrorHandling => "ERROR_HANDLING",
        }
    }

    /// Stream a retried payload for this stage must be re-published to.
    pub fn input_stream(&self) -> &'static str {
        match self {
            PipelineStage::Search => crate::defaults::STREAM_SEARCH_REQUESTS,
            PipelineStage::Validation => crate::defaults::STREAM_RESULTS_RAW,
            PipelineStage::Scoring => crate::defaults::STREAM_RESULTS_VALIDATED,
            PipelineStage::ErrorHandling => crate::defaults::STREAM_WORKFLOW_ERRORS,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SEARCH" => Ok(PipelineStage::Search),
            "VALIDATION" => Ok(PipelineStage::Validation),
            "SCORING" => Ok(PipelineStage::Scoring),
            "ERROR_HANDLING" => Ok(PipelineStage::ErrorHandling),
            _ => Err(format!("Unknown pipeline stage: '{}'", s)),
        }
    }
}

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Category of a workflow error. Drives the retry vs dead-letter decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection failure, DNS, read timeout. Transient.
    AdapterNetwork,
    /// Upstream 5xx. Transient.
    AdapterHttp5xx,
    /// Bad request or unauthorized. Permanent.
    AdapterHttp4xx,
    /// Malformed engine response. Permanent.
    AdapterParse,
    /// No registered adapter for the requested engine. Permanent.
    UnsupportedEngine,
    /// Blacklist cache down; processing continues against the registry.
    /// Logged only, never published to the error stream.
    CacheUnavailable,
    /// Optimistic-concurrency conflict on a domain row. Retried in-process.
    RegistryContention,
    /// Missing URL or unusable metadata on a single result. The result is
    /// dropped silently.
    ScoringInvalidInput,
    /// Per-message stage deadline exceeded. Transient.
    StageTimeout,
    /// Invariant violation. Permanent, dead-letter immediately.
    StageFatal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::AdapterNetwork => "adapter.network",
            ErrorCategory::AdapterHttp5xx => "adapter.http_5xx",
            ErrorCategory::AdapterHttp4xx => "adapter.http_4xx",
            ErrorCategory::AdapterParse => "adapter.parse",
            ErrorCategory::UnsupportedEngine => "adapter.unsupported_engine",
            ErrorCategory::CacheUnavailable => "cache.unavailable",
            ErrorCategory::RegistryContention => "registry.contention",
            ErrorCategory::ScoringInvalidInput => "scoring.invalid_input",
            ErrorCategory::StageTimeout => "stage.timeout",
            ErrorCategory::StageFatal => "stage.fatal",
        }
    }

    /// Transient categories are eligible for re-publication; permanent ones
    /// dead-letter immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCategory::AdapterNetwork
                | ErrorCategory::AdapterHttp5xx
                | ErrorCategory::CacheUnavailable
                | ErrorCategory::RegistryContention
                | ErrorCategory::StageTimeout
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adapter.network" => Ok(ErrorCategory::AdapterNetwork),
            "adapter.http_5xx" => Ok(ErrorCategory::AdapterHttp5xx),
            "adapter.http_4xx" => Ok(ErrorCategory::AdapterHttp4xx),
            "adapter.parse" => Ok(ErrorCategory::AdapterParse),
            "adapter.unsupported_engine" => Ok(ErrorCategory::UnsupportedEngine),
            "cache.unavailable" => Ok(ErrorCategory::CacheUnavailable),
            "registry.contention" => Ok(ErrorCategory::RegistryContention),
            "scoring.invalid_input" => Ok(ErrorCategory::ScoringInvalidInput),
            "stage.timeout" => Ok(ErrorCategory::StageTimeout),
            "stage.fatal" => Ok(ErrorCategory::StageFatal),
            _ => Err(format!("Unknown error category: '{}'", s)),
        }
    }
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Persisted discovery-session status. Terminal statuses are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "RUNNING",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RUNNING" => Ok(SessionStatus::Running),
            "COMPLETED" => Ok(SessionStatus::Completed),
            "FAILED" => Ok(SessionStatus::Failed),
            _ => Err(format!("Unknown session status: '{}'", s)),
        }
    }
}

/// User-visible session disposition returned by the status query.
///
/// `Partial` is derived from counters (some batches dead-lettered while
/// others produced candidates); it is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionDisposition {
    Running,
    Completed,
    Failed,
    Partial,
}

impl SessionDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionDisposition::Running => "RUNNING",
            SessionDisposition::Completed => "COMPLETED",
            SessionDisposition::Failed => "FAILED",
            SessionDisposition::Partial => "PARTIAL",
        }
    }
}

impl fmt::Display for SessionDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Domain Lifecycle
// ============================================================================

/// Status of a domain in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainStatus {
    /// First sighting recorded; nothing judged yet.
    #[default]
    Discovered,
    /// At least one result from this domain scored at or above threshold.
    ProcessedHighQuality,
    /// Consecutive sub-threshold sightings with no high hits.
    ProcessedLowQuality,
    /// Administrative block. Terminal unless lifted by an admin.
    Blacklisted,
    /// Repeated processing errors. Counters only; still searchable.
    Failed,
}

impl DomainStatus {
    pub const ALL: &'static [DomainStatus] = &[
        DomainStatus::Discovered,
        DomainStatus::ProcessedHighQuality,
        DomainStatus::ProcessedLowQuality,
        DomainStatus::Blacklisted,
        DomainStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Discovered => "DISCOVERED",
            DomainStatus::ProcessedHighQuality => "PROCESSED_HIGH_QUALITY",
            DomainStatus::ProcessedLowQuality => "PROCESSED_LOW_QUALITY",
            DomainStatus::Blacklisted => "BLACKLISTED",
            DomainStatus::Failed => "FAILED",
        }
    }

    /// Transition checker for the domain state machine.
    ///
    /// Blacklisted is terminal except for an admin lift back to Discovered.
    /// Failed is reachable from any status; a later judgement may move the
    /// domain back into a processed status.
    pub fn can_transition_to(&self, next: DomainStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            DomainStatus::Blacklisted => matches!(next, DomainStatus::Discovered),
            DomainStatus::Discovered => true,
            DomainStatus::ProcessedHighQuality => !matches!(next, DomainStatus::Discovered),
            DomainStatus::ProcessedLowQuality => !matches!(next, DomainStatus::Discovered),
            DomainStatus::Failed => true,
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DomainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DISCOVERED" => Ok(DomainStatus::Discovered),
            "PROCESSED_HIGH_QUALITY" => Ok(DomainStatus::ProcessedHighQuality),
            "PROCESSED_LOW_QUALITY" => Ok(DomainStatus::ProcessedLowQuality),
            "BLACKLISTED" => Ok(DomainStatus::Blacklisted),
            "FAILED" => Ok(DomainStatus::Failed),
            _ => Err(format!("Unknown domain status: '{}'", s)),
        }
    }
}

// ============================================================================
// Candidate Lifecycle
// ============================================================================

/// Status of a persisted candidate. The discovery core only ever writes
/// `PendingCrawl`; downstream collaborators advance the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    #[default]
    PendingCrawl,
    Crawled,
    Reviewed,
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::PendingCrawl => "PENDING_CRAWL",
            CandidateStatus::Crawled => "CRAWLED",
            CandidateStatus::Reviewed => "REVIEWED",
            CandidateStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING_CRAWL" => Ok(CandidateStatus::PendingCrawl),
            "CRAWLED" => Ok(CandidateStatus::Crawled),
            "REVIEWED" => Ok(CandidateStatus::Reviewed),
            "REJECTED" => Ok(CandidateStatus::Rejected),
            _ => Err(format!("Unknown candidate status: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_category_transience() {
        assert!(ErrorCategory::AdapterNetwork.is_transient());
        assert!(ErrorCategory::StageTimeout.is_transient());
        assert!(!ErrorCategory::AdapterHttp4xx.is_transient());
        assert!(!ErrorCategory::UnsupportedEngine.is_transient());
        assert!(!ErrorCategory::StageFatal.is_transient());
    }

    #[test]
    fn region_validation() {
        assert_eq!(Region::new("bg").unwrap().as_str(), "BG");
        assert_eq!(Region::new(" US ").unwrap().as_str(), "US");
        assert!(Region::new("BGR").is_err());
        assert!(Region::new("1G").is_err());
        assert!(Region::new("").is_err());
    }

    #[test]
    fn domain_transitions() {
        assert!(DomainStatus::Discovered.can_transition_to(DomainStatus::ProcessedHighQuality));
        assert!(DomainStatus::Discovered.can_transition_to(DomainStatus::Blacklisted));
        assert!(!DomainStatus::Blacklisted.can_transition_to(DomainStatus::ProcessedHighQuality));
        assert!(DomainStatus::Blacklisted.can_transition_to(DomainStatus::Discovered));
        assert!(DomainStatus::ProcessedLowQuality.can_transition_to(DomainStatus::ProcessedHighQuality));
    }

    #[test]
    fn wire_forms_round_trip() {
        for stage in PipelineStage::ALL {
            assert_eq!(*stage, stage.as_str().parse().unwrap());
        }
        for status in DomainStatus::ALL {
            assert_eq!(*status, status.as_str().parse().unwrap());
        }
        assert_eq!(
            "adapter.http_5xx".parse::<ErrorCategory>().unwrap(),
            ErrorCategory::AdapterHttp5xx
        );
    }
}
