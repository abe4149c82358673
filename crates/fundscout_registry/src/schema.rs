//! Schema bootstrap.
//!
//! Idempotent DDL, executed once at startup. Confidence columns are TEXT
//! holding canonical two-digit decimals; the candidate CHECK mirrors the
//! [0, 1] range constraint.

use crate::error::RegistryError;
use sqlx::{Pool, Sqlite};

const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS fs_domain (
        domain_name TEXT PRIMARY KEY,
        status TEXT NOT NULL DEFAULT 'DISCOVERED',
        discovered_at TEXT NOT NULL,
        last_processed_at TEXT,
        best_confidence_score TEXT NOT NULL DEFAULT '0.00',
        high_quality_count INTEGER NOT NULL DEFAULT 0,
        low_quality_count INTEGER NOT NULL DEFAULT 0,
        consecutive_low_count INTEGER NOT NULL DEFAULT 0,
        consecutive_error_count INTEGER NOT NULL DEFAULT 0,
        blacklist_reason TEXT,
        retry_after TEXT,
        version INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fs_candidate (
        candidate_id TEXT PRIMARY KEY,
        domain_name TEXT NOT NULL REFERENCES fs_domain(domain_name),
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        engine TEXT NOT NULL,
        confidence_score TEXT NOT NULL
            CHECK (CAST(confidence_score AS REAL) >= 0.0
               AND CAST(confidence_score AS REAL) <= 1.0),
        status TEXT NOT NULL DEFAULT 'PENDING_CRAWL',
        session_id TEXT NOT NULL,
        discovered_at TEXT NOT NULL,
        UNIQUE (session_id, url)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fs_session (
        session_id TEXT PRIMARY KEY,
        request_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'RUNNING',
        started_at TEXT NOT NULL,
        completed_at TEXT,
        queries_emitted INTEGER NOT NULL DEFAULT 0,
        candidates_found INTEGER NOT NULL DEFAULT 0,
        duplicates_detected INTEGER NOT NULL DEFAULT 0,
        average_confidence_score TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fs_workflow_error (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        request_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        stage TEXT NOT NULL,
        error_type TEXT NOT NULL,
        message TEXT NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        dead_letter INTEGER NOT NULL DEFAULT 0,
        original_payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_fs_candidate_session ON fs_candidate (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_fs_error_session ON fs_workflow_error (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_fs_domain_status ON fs_domain (status)",
];

pub async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), RegistryError> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
