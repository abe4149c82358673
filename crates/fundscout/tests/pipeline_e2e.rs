//! End-to-end pipeline scenarios: trigger in, candidates out, with the
//! stage workers running against an in-memory store and a scripted engine.

use fundscout_pipeline::{Pipeline, PipelineConfig, PipelineDeps, TriggerInput};
use fundscout_protocol::defaults::STREAM_RESULTS_RAW;
use fundscout_protocol::{
    partition_key, FundingCategory, FundingType, RawResult, RecipientType, Region, SearchEngine,
    SessionDisposition, SessionStatus, SearchResultsRawEvent,
};
use fundscout_registry::{
    CacheStore, CandidateRepository, DomainRegistry, DomainRepository, ErrorRepository,
    SessionRepository, SqliteStore,
};
use fundscout_scoring::ScoringConfig;
use fundscout_search::{AdapterRegistry, EngineResult};
use fundscout_test_utils::{
    engine_result, memory_store, FailingQueryGenerator, FixedQueryGenerator, MockSearchAdapter,
    ScriptedResponse, UnavailableCacheStore,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(30);

fn education_request() -> TriggerInput {
    TriggerInput {
        category: FundingCategory::Education,
        region: Region::new("BG").unwrap(),
        funding_type: FundingType::Scholarship,
        recipient_type: RecipientType::K12School,
        engine: SearchEngine::Searxng,
    }
}

fn gov_result(rank: u32) -> EngineResult {
    engine_result(
        "https://education.gov.bg/grants/stem",
        "Bulgaria STEM Scholarships 2025",
        "Grants and funding for Bulgarian schools",
        rank,
    )
}

fn blog_result(rank: u32) -> EngineResult {
    engine_result(
        "https://random-blog.example/tips",
        "How to find money",
        "Personal finance tips and tricks",
        rank,
    )
}

struct Harness {
    pipeline: Pipeline,
    store: SqliteStore,
}

async fn start(
    script: Vec<ScriptedResponse>,
    queries: Vec<&str>,
    scoring: ScoringConfig,
    blacklist_store: Option<Arc<dyn CacheStore<String, bool>>>,
    blacklisted: &[&str],
) -> Harness {
    let store = memory_store().await;
    if !blacklisted.is_empty() {
        let registry = DomainRegistry::new(Arc::new(store.clone()));
        for domain in blacklisted {
            registry
                .mark_blacklisted(domain, "pre-populated")
                .await
                .expect("blacklist setup");
        }
    }

    let shared = Arc::new(store.clone());
    let deps = PipelineDeps {
        adapters: AdapterRegistry::new().register(Arc::new(MockSearchAdapter::new(script))),
        generator: Arc::new(FixedQueryGenerator::new(queries)),
        domains: shared.clone(),
        candidates: shared.clone(),
        sessions: shared.clone(),
        errors: shared,
        scoring,
        blacklist_store,
    };
    let config = PipelineConfig {
        partitions: 4,
        partition_capacity: 64,
        ..Default::default()
    };
    let pipeline = Pipeline::start(deps, config).await.expect("pipeline start");
    Harness { pipeline, store }
}

async fn error_row_count(store: &SqliteStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM fs_workflow_error")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn happy_path_creates_one_candidate() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![gov_result(1), blog_result(2)])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    assert_eq!(receipt.queries_emitted, 1);

    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .expect("status");
    assert_eq!(status.disposition, SessionDisposition::Completed);
    assert_eq!(status.candidates_found, 1);
    assert_eq!(status.sub_threshold, 1);
    assert_eq!(status.duplicates_detected, 0);
    assert_eq!(status.blacklisted_dropped, 0);
    assert_eq!(status.outstanding, 0);

    // Both domains registered.
    assert!(harness.store.lookup("education.gov.bg").await.unwrap().is_some());
    assert!(harness.store.lookup("random-blog.example").await.unwrap().is_some());

    // The candidate is the government page, scored high.
    let candidates = harness.store.list_for_session(receipt.session_id).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].url, "https://education.gov.bg/grants/stem");
    assert!(candidates[0].confidence().unwrap() >= "0.90".parse().unwrap());

    // Session record flushed as COMPLETED with the same counters.
    let session = harness
        .store
        .lookup_session(receipt.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status().unwrap(), SessionStatus::Completed);
    assert_eq!(session.candidates_found, 1);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn blacklisted_domain_never_becomes_a_candidate() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![
            engine_result(
                "https://gambling.example/win-big-grants",
                "Casino grants and scholarship funding bonanza",
                "Grants grants grants for Bulgarian schools",
                1,
            ),
            gov_result(2),
            engine_result(
                "https://gambling.example/more",
                "More scholarship grants",
                "Funding for Bulgaria",
                3,
            ),
        ])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &["gambling.example"],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.disposition, SessionDisposition::Completed);
    assert_eq!(status.blacklisted_dropped, 2);
    assert_eq!(status.candidates_found, 1);

    let candidates = harness.store.list_for_session(receipt.session_id).await.unwrap();
    assert!(candidates.iter().all(|c| c.domain_name != "gambling.example"));

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn session_dedup_scores_a_host_once() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![
            engine_result(
                "https://us-bulgaria.org/programs",
                "US-Bulgaria education grants",
                "Foundation grants for Bulgarian schools",
                1,
            ),
            engine_result(
                "https://us-bulgaria.org/apply",
                "Apply for funding",
                "Application details",
                2,
            ),
        ])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.duplicates_detected, 1);
    assert!(status.candidates_found <= 1);
    // One score contributed: exactly one result survived to scoring.
    assert_eq!(status.sub_threshold + status.candidates_found, 1);

    let record = harness.store.lookup("us-bulgaria.org").await.unwrap().unwrap();
    assert_eq!(record.high_quality_count + record.low_quality_count, 1);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn transient_engine_failures_recover_without_dead_letters() {
    let started = Instant::now();
    let harness = start(
        vec![
            ScriptedResponse::Http5xx(503),
            ScriptedResponse::Http5xx(503),
            ScriptedResponse::Results(vec![gov_result(1)]),
        ],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.disposition, SessionDisposition::Completed);
    assert_eq!(status.candidates_found, 1);
    assert_eq!(status.dead_letters, 0);
    // Two in-adapter backoffs (~200 ms + ~400 ms, with -25 % jitter).
    assert!(started.elapsed() >= Duration::from_millis(450));
    // The retries were absorbed inside the adapter: no error-stream records.
    assert_eq!(error_row_count(&harness.store).await, 0);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn permanent_failures_dead_letter_and_fail_the_session() {
    let harness = start(
        vec![ScriptedResponse::Http4xx(403)],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.disposition, SessionDisposition::Failed);
    assert_eq!(status.dead_letters, 1);
    assert_eq!(status.candidates_found, 0);
    assert_eq!(harness.store.dead_letter_count(receipt.session_id).await.unwrap(), 1);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn exhausted_transient_retries_dead_letter_after_backoff() {
    // Every adapter attempt fails: 3 attempts per search call, and the
    // error handler re-publishes the flight 3 times before dead-letter.
    let started = Instant::now();
    let harness = start(
        vec![ScriptedResponse::Network("connection reset".into()); 12],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.disposition, SessionDisposition::Failed);
    assert_eq!(status.dead_letters, 1);
    // Error-handler backoffs alone: 200 + 400 + 800 ms.
    assert!(started.elapsed() >= Duration::from_millis(1400));
    // One record per failed pass: three retried, one dead-lettered.
    assert_eq!(error_row_count(&harness.store).await, 4);
    assert_eq!(harness.store.dead_letter_count(receipt.session_id).await.unwrap(), 1);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn empty_result_page_completes_with_zero_candidates() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.disposition, SessionDisposition::Completed);
    assert_eq!(status.candidates_found, 0);
    assert_eq!(status.average_confidence, None);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn every_result_blacklisted_still_completes() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![
            engine_result("https://gambling.example/a", "Grants", "Funding", 1),
            engine_result("https://spam-casino.example/b", "Grants", "Funding", 2),
        ])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &["gambling.example", "spam-casino.example"],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.disposition, SessionDisposition::Completed);
    assert_eq!(status.candidates_found, 0);
    assert_eq!(status.blacklisted_dropped, 2);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn aggregate_landing_exactly_on_threshold_is_admitted() {
    use fundscout_scoring::{CredibilityConfig, GeoConfig, OrgTypeConfig, WeightedTerm};
    use rust_decimal::Decimal;

    // 0.30*1.00 + 0.25*0.40 + 0.25*0.20 + 0.20*0.75 = 0.60 exactly.
    let scoring = ScoringConfig {
        funding_keywords: vec![WeightedTerm {
            term: "grant".into(),
            weight: Decimal::ONE,
        }],
        credibility: CredibilityConfig {
            spam_markers: vec![],
            spam_score: Decimal::ZERO,
            authority_labels: vec![],
            authority_score: Decimal::ONE,
            fallback: Decimal::new(40, 2),
            suffix_tiers: vec![],
        },
        geography: GeoConfig {
            match_score: Decimal::ONE,
            continent_terms: vec![],
            continent_score: Decimal::new(60, 2),
            fallback: Decimal::new(20, 2),
            region_terms: Default::default(),
        },
        organization: OrgTypeConfig {
            fallback: Decimal::new(75, 2),
            classes: vec![],
        },
    };

    let harness = start(
        vec![ScriptedResponse::Results(vec![engine_result(
            "https://threshold.example/page",
            "grant",
            "",
            1,
        )])],
        vec!["Bulgaria education scholarships"],
        scoring,
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    assert_eq!(status.candidates_found, 1);
    let candidates = harness.store.list_for_session(receipt.session_id).await.unwrap();
    assert_eq!(candidates[0].confidence_score, "0.60");

    let domain = harness.store.lookup("threshold.example").await.unwrap().unwrap();
    assert_eq!(domain.best_confidence_score, "0.60");

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn unavailable_blacklist_cache_degrades_without_errors() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![
            engine_result("https://gambling.example/a", "Grants", "Funding", 1),
            gov_result(2),
        ])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        Some(Arc::new(UnavailableCacheStore)),
        &["gambling.example"],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    // Filtering still correct, and no workflow errors were raised.
    assert_eq!(status.disposition, SessionDisposition::Completed);
    assert_eq!(status.blacklisted_dropped, 1);
    assert_eq!(status.candidates_found, 1);
    assert_eq!(error_row_count(&harness.store).await, 0);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn batch_counts_are_conserved_across_stages() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![
            gov_result(1),
            blog_result(2),
            engine_result(
                "https://education.gov.bg/grants/arts",
                "Arts scholarships",
                "More grants",
                3,
            ),
            engine_result("https://gambling.example/x", "Grants", "Funding", 4),
        ])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &["gambling.example"],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();

    let accounted = status.candidates_found
        + status.sub_threshold
        + status.duplicates_detected
        + status.blacklisted_dropped
        + status.scoring_dropped;
    assert_eq!(accounted, 4);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn republishing_a_raw_event_does_not_duplicate_candidates() {
    let harness = start(
        vec![ScriptedResponse::Results(vec![gov_result(1)])],
        vec!["Bulgaria education scholarships"],
        ScoringConfig::builtin(),
        None,
        &[],
    )
    .await;

    let receipt = harness
        .pipeline
        .trigger()
        .execute(education_request())
        .await
        .unwrap();
    let status = harness
        .pipeline
        .wait_for_request(receipt.request_id, WAIT)
        .await
        .unwrap();
    assert_eq!(status.candidates_found, 1);

    // Re-publish the same batch; candidate writes are idempotent by
    // (session, url), so nothing new lands.
    let now = chrono::Utc::now();
    let event = SearchResultsRawEvent {
        request_id: receipt.request_id,
        session_id: receipt.session_id,
        engine: SearchEngine::Searxng,
        results: vec![RawResult {
            url: "https://education.gov.bg/grants/stem".into(),
            title: "Bulgaria STEM Scholarships 2025".into(),
            description: "Grants and funding for Bulgarian schools".into(),
            rank: 1,
            discovered_at: now,
        }],
        total_results: 1,
        execution_time_ms: 5,
        timestamp: now,
    };
    let key = partition_key(receipt.session_id, receipt.request_id, SearchEngine::Searxng);
    harness
        .pipeline
        .log()
        .publisher(STREAM_RESULTS_RAW)
        .unwrap()
        .publish(&key, &event)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let candidates = harness.store.list_for_session(receipt.session_id).await.unwrap();
    assert_eq!(candidates.len(), 1);

    harness.pipeline.shutdown().await;
}

#[tokio::test]
async fn generator_failure_fails_the_trigger_with_no_session() {
    let store = memory_store().await;
    let shared = Arc::new(store.clone());
    let deps = PipelineDeps {
        adapters: AdapterRegistry::new().register(Arc::new(MockSearchAdapter::new(vec![]))),
        generator: Arc::new(FailingQueryGenerator),
        domains: shared.clone(),
        candidates: shared.clone(),
        sessions: shared.clone(),
        errors: shared,
        scoring: ScoringConfig::builtin(),
        blacklist_store: None,
    };
    let pipeline = Pipeline::start(deps, PipelineConfig::default()).await.unwrap();

    let result = pipeline.trigger().execute(education_request()).await;
    assert!(result.is_err());

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fs_session")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(sessions, 0);

    pipeline.shutdown().await;
}
