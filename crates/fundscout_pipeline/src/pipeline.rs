//! Pipeline wiring: topics, workers, shutdown.

use crate::error_stage::ErrorStage;
use crate::generator::QueryGenerator;
use crate::orchestrator::{RequestStatus, SessionOrchestrator};
use crate::runtime::{run_partition, StageWorker};
use crate::scoring_stage::ScoringStage;
use crate::search_stage::SearchStage;
use crate::trigger::RequestTrigger;
use crate::validation_stage::ValidationStage;
use anyhow::{Context, Result};
use fundscout_protocol::defaults::{
    self, DEFAULT_MAX_RESULTS_PER_QUERY, DEFAULT_PARTITIONS, DEFAULT_PARTITION_CAPACITY,
    ERROR_RETENTION, ERROR_STAGE_CONCURRENCY, PIPELINE_RETENTION, SCORING_STAGE_CONCURRENCY,
    SEARCH_STAGE_CONCURRENCY, VALIDATION_STAGE_CONCURRENCY,
};
use fundscout_protocol::{PipelineStage, RequestId, SessionDisposition};
use fundscout_registry::{
    BlacklistCache, CacheStore, CandidateRepository, DomainRegistry, DomainRepository,
    ErrorRepository, SessionRepository,
};
use fundscout_scoring::{ConfidenceScorer, ScoringConfig};
use fundscout_search::AdapterRegistry;
use fundscout_stream::{MessageLog, TopicSpec};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub partitions: usize,
    pub partition_capacity: usize,
    pub search_concurrency: usize,
    pub validation_concurrency: usize,
    pub scoring_concurrency: usize,
    pub error_concurrency: usize,
    pub max_results_per_query: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            partitions: DEFAULT_PARTITIONS,
            partition_capacity: DEFAULT_PARTITION_CAPACITY,
            search_concurrency: SEARCH_STAGE_CONCURRENCY,
            validation_concurrency: VALIDATION_STAGE_CONCURRENCY,
            scoring_concurrency: SCORING_STAGE_CONCURRENCY,
            error_concurrency: ERROR_STAGE_CONCURRENCY,
            max_results_per_query: DEFAULT_MAX_RESULTS_PER_QUERY,
        }
    }
}

/// Everything the pipeline needs injected. Constructor wiring only; no
/// global lookup of any kind.
pub struct PipelineDeps {
    pub adapters: AdapterRegistry,
    pub generator: Arc<dyn QueryGenerator>,
    pub domains: Arc<dyn DomainRepository>,
    pub candidates: Arc<dyn CandidateRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub errors: Arc<dyn ErrorRepository>,
    pub scoring: ScoringConfig,
    /// Override for the blacklist cache store (tests inject failing stores).
    pub blacklist_store: Option<Arc<dyn CacheStore<String, bool>>>,
}

pub struct Pipeline {
    log: MessageLog,
    trigger: Arc<RequestTrigger>,
    orchestrator: Arc<SessionOrchestrator>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub async fn start(deps: PipelineDeps, config: PipelineConfig) -> Result<Self> {
        let log = MessageLog::new(vec![
            TopicSpec {
                name: defaults::STREAM_SEARCH_REQUESTS.into(),
                partitions: config.partitions,
                retention: PIPELINE_RETENTION,
                capacity: config.partition_capacity,
            },
            TopicSpec {
                name: defaults::STREAM_RESULTS_RAW.into(),
                partitions: config.partitions,
                retention: PIPELINE_RETENTION,
                capacity: config.partition_capacity,
            },
            TopicSpec {
                name: defaults::STREAM_RESULTS_VALIDATED.into(),
                partitions: config.partitions,
                retention: PIPELINE_RETENTION,
                capacity: config.partition_capacity,
            },
            TopicSpec {
                name: defaults::STREAM_WORKFLOW_ERRORS.into(),
                partitions: config.partitions,
                retention: ERROR_RETENTION,
                capacity: config.partition_capacity,
            },
        ]);

        let requests = log.publisher(defaults::STREAM_SEARCH_REQUESTS)?;
        let raw_results = log.publisher(defaults::STREAM_RESULTS_RAW)?;
        let validated = log.publisher(defaults::STREAM_RESULTS_VALIDATED)?;
        let errors = log.publisher(defaults::STREAM_WORKFLOW_ERRORS)?;

        let registry = DomainRegistry::new(Arc::clone(&deps.domains));
        let blacklist = Arc::new(match deps.blacklist_store {
            Some(store) => BlacklistCache::with_store(registry.clone(), store),
            None => BlacklistCache::new(registry.clone()),
        });
        if let Err(err) = blacklist.warm().await {
            warn!(error = %err, "blacklist warm-up failed, starting cold");
        }
        let scorer = Arc::new(
            ConfidenceScorer::standard(deps.scoring).context("scorer construction failed")?,
        );
        let orchestrator = Arc::new(SessionOrchestrator::new(Arc::clone(&deps.sessions)));

        let trigger = Arc::new(RequestTrigger::new(
            Arc::clone(&deps.generator),
            Arc::clone(&orchestrator),
            requests.clone(),
            errors.clone(),
        ));

        let search_stage: Arc<dyn StageWorker> = Arc::new(SearchStage::new(
            deps.adapters,
            raw_results.clone(),
            errors.clone(),
            config.max_results_per_query,
        ));
        let validation_stage: Arc<dyn StageWorker> = Arc::new(ValidationStage::new(
            Arc::clone(&orchestrator),
            Arc::clone(&blacklist),
            registry.clone(),
            validated.clone(),
            errors.clone(),
        ));
        let scoring_stage: Arc<dyn StageWorker> = Arc::new(ScoringStage::new(
            Arc::clone(&orchestrator),
            scorer,
            registry,
            Arc::clone(&deps.candidates),
            errors.clone(),
        ));
        let error_stage: Arc<dyn StageWorker> = Arc::new(ErrorStage::new(
            Arc::clone(&orchestrator),
            Arc::clone(&deps.errors),
            HashMap::from([
                (PipelineStage::Search, requests.clone()),
                (PipelineStage::Validation, raw_results.clone()),
                (PipelineStage::Scoring, validated.clone()),
            ]),
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let stages: [(&str, Arc<dyn StageWorker>, usize); 4] = [
            (
                defaults::STREAM_SEARCH_REQUESTS,
                search_stage,
                config.search_concurrency,
            ),
            (
                defaults::STREAM_RESULTS_RAW,
                validation_stage,
                config.validation_concurrency,
            ),
            (
                defaults::STREAM_RESULTS_VALIDATED,
                scoring_stage,
                config.scoring_concurrency,
            ),
            (
                defaults::STREAM_WORKFLOW_ERRORS,
                error_stage,
                config.error_concurrency,
            ),
        ];

        for (stream, worker, concurrency) in stages {
            let permits = Arc::new(Semaphore::new(concurrency.max(1)));
            let group = format!("fundscout-{}", worker.stage().as_str().to_lowercase());
            for partition in 0..config.partitions {
                let subscription = log
                    .subscribe(stream, &group, partition)
                    .await
                    .with_context(|| format!("subscribing to '{}'", stream))?;
                tasks.push(tokio::spawn(run_partition(
                    Arc::clone(&worker),
                    subscription,
                    shutdown_rx.clone(),
                    Arc::clone(&permits),
                )));
            }
        }

        // Retention pass once an hour.
        {
            let log = log.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(3600));
                loop {
                    tokio::select! {
                        _ = ticker.tick() => log.prune().await,
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            }));
        }

        info!(
            partitions = config.partitions,
            "pipeline started with four stage groups"
        );
        Ok(Self {
            log,
            trigger,
            orchestrator,
            shutdown,
            tasks,
        })
    }

    pub fn trigger(&self) -> Arc<RequestTrigger> {
        Arc::clone(&self.trigger)
    }

    /// The message log; the wire surface downstream collaborators subscribe
    /// to by stream name.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub async fn status(&self, request_id: RequestId) -> Option<RequestStatus> {
        self.orchestrator.status(request_id).await
    }

    /// Poll until the request reaches a terminal disposition or the timeout
    /// elapses. Returns the last observed status either way.
    pub async fn wait_for_request(
        &self,
        request_id: RequestId,
        timeout: Duration,
    ) -> Option<RequestStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.orchestrator.status(request_id).await;
            match &status {
                Some(s) if s.disposition != SessionDisposition::Running => return status,
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Stop consuming: workers drain their in-flight message and exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("pipeline stopped");
    }
}
