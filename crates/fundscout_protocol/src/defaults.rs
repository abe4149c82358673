//! Canonical stream names, retention windows and tuning defaults shared
//! across the pipeline.

use std::time::Duration;

// ============================================================================
// Streams (wire contract: downstream collaborators subscribe by name)
// ============================================================================

pub const STREAM_SEARCH_REQUESTS: &str = "search-requests";
pub const STREAM_RESULTS_RAW: &str = "search-results-raw";
pub const STREAM_RESULTS_VALIDATED: &str = "search-results-validated";
pub const STREAM_WORKFLOW_ERRORS: &str = "workflow-errors";

/// Retention for the three pipeline streams.
pub const PIPELINE_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);
/// Retention for the error stream.
pub const ERROR_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

/// Partitions per stream. One partition owns the full flight of a
/// `(session, request, engine)` tuple.
pub const DEFAULT_PARTITIONS: usize = 8;
/// Uncommitted records a partition holds before publication blocks.
pub const DEFAULT_PARTITION_CAPACITY: usize = 1024;

// ============================================================================
// Search adapter HTTP discipline
// ============================================================================

pub const ADAPTER_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const ADAPTER_TOTAL_DEADLINE: Duration = Duration::from_secs(10);
/// Attempts per adapter call (first try + retries) for transient faults.
pub const ADAPTER_MAX_ATTEMPTS: u32 = 3;
pub const ADAPTER_BACKOFF_BASE_MS: u64 = 200;
/// Jitter applied to each backoff delay, as a percentage of the delay.
pub const ADAPTER_BACKOFF_JITTER_PCT: u64 = 25;

pub const DEFAULT_MAX_RESULTS_PER_QUERY: usize = 20;

// ============================================================================
// Error handler retry policy
// ============================================================================

/// Re-publications of a transient failure before dead-letter.
pub const ERROR_MAX_RETRIES: u32 = 3;
pub const ERROR_BACKOFF_BASE_MS: u64 = 200;
pub const ERROR_BACKOFF_CAP_MS: u64 = 8_000;

// ============================================================================
// Stage deadlines & concurrency
// ============================================================================

pub const TRIGGER_DEADLINE: Duration = Duration::from_secs(30);
pub const SEARCH_STAGE_DEADLINE: Duration = Duration::from_secs(10);
pub const VALIDATION_STAGE_DEADLINE: Duration = Duration::from_secs(2);
pub const SCORING_STAGE_DEADLINE: Duration = Duration::from_secs(2);

/// Bounded by the upstream engine rate.
pub const SEARCH_STAGE_CONCURRENCY: usize = 4;
pub const VALIDATION_STAGE_CONCURRENCY: usize = 8;
pub const SCORING_STAGE_CONCURRENCY: usize = 8;
pub const ERROR_STAGE_CONCURRENCY: usize = 2;

// ============================================================================
// Domain registry & blacklist cache
// ============================================================================

pub const BLACKLIST_CACHE_CAPACITY: usize = 10_000;
pub const BLACKLIST_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

/// Consecutive sub-threshold sightings before a domain is downgraded to
/// PROCESSED_LOW_QUALITY.
pub const CONSECUTIVE_LOW_FOR_DOWNGRADE: u32 = 3;
/// Consecutive processing errors before a domain is marked FAILED.
pub const CONSECUTIVE_ERRORS_FOR_FAILED: u32 = 5;

/// In-process retries of an optimistic-concurrency domain update.
pub const REGISTRY_CAS_MAX_ATTEMPTS: u32 = 5;

pub const DEFAULT_DB_URL: &str = "sqlite:fundscout.db";
pub const DEFAULT_SEARXNG_URL: &str = "http://127.0.0.1:8888";
