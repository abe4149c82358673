//! FundScout unified launcher.
//!
//! `serve` runs the full discovery pipeline until interrupted. `trigger`
//! runs one request end to end in-process and prints the outcome (the
//! demo/ops mode; a deployment fronts `serve` with its HTTP layer).
//! `status` and `blacklist` are the read and admin surfaces.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fundscout_logging::{init_logging, LogConfig};
use fundscout_pipeline::{
    Pipeline, PipelineConfig, PipelineDeps, TemplateQueryGenerator, TriggerInput,
};
use fundscout_protocol::defaults::DEFAULT_SEARXNG_URL;
use fundscout_protocol::{
    FundingCategory, FundingType, RecipientType, Region, RequestId, SearchEngine,
};
use fundscout_registry::{
    ensure_schema, CandidateRepository, DomainRegistry, SessionRepository, SqliteStore,
};
use fundscout_scoring::ScoringConfig;
use fundscout_search::{AdapterRegistry, SearxngAdapter};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "fundscout", about = "Funding-source discovery pipeline", version)]
struct Cli {
    /// SQLite database path.
    #[arg(long, global = true, env = "FUNDSCOUT_DB", default_value = "fundscout.db")]
    db: PathBuf,

    /// Verbose console logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline until interrupted.
    Serve {
        /// Base URL of the SearXNG instance.
        #[arg(long, env = "FUNDSCOUT_SEARXNG_URL", default_value = DEFAULT_SEARXNG_URL)]
        searxng_url: String,
        /// TOML file overriding the builtin scoring tables.
        #[arg(long)]
        scoring_config: Option<PathBuf>,
    },
    /// Run one discovery request end to end and print the outcome.
    Trigger {
        #[arg(long)]
        category: FundingCategory,
        /// ISO 3166-1 alpha-2 region code.
        #[arg(long)]
        region: Region,
        #[arg(long)]
        funding_type: FundingType,
        #[arg(long)]
        recipient_type: RecipientType,
        #[arg(long, default_value = "SEARXNG")]
        engine: SearchEngine,
        #[arg(long, env = "FUNDSCOUT_SEARXNG_URL", default_value = DEFAULT_SEARXNG_URL)]
        searxng_url: String,
        #[arg(long)]
        scoring_config: Option<PathBuf>,
        /// How long to wait for the session to finish.
        #[arg(long, default_value_t = 60)]
        wait_secs: u64,
    },
    /// Show the persisted progress of one request.
    Status {
        #[arg(long)]
        request_id: RequestId,
    },
    /// Blacklist a domain (admin).
    Blacklist {
        #[arg(long)]
        domain: String,
        #[arg(long, default_value = "manual blacklist")]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig {
        app_name: "fundscout",
        verbose: cli.verbose,
    })?;

    let store = open_store(&cli.db).await?;

    match cli.command {
        Command::Serve {
            searxng_url,
            scoring_config,
        } => serve(store, &searxng_url, scoring_config).await,
        Command::Trigger {
            category,
            region,
            funding_type,
            recipient_type,
            engine,
            searxng_url,
            scoring_config,
            wait_secs,
        } => {
            let input = TriggerInput {
                category,
                region,
                funding_type,
                recipient_type,
                engine,
            };
            trigger_once(store, &searxng_url, scoring_config, input, wait_secs).await
        }
        Command::Status { request_id } => status(store, request_id).await,
        Command::Blacklist { domain, reason } => blacklist(store, &domain, &reason).await,
    }
}

async fn open_store(path: &PathBuf) -> Result<SqliteStore> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("opening database {}", path.display()))?;
    ensure_schema(&pool).await.context("schema bootstrap")?;
    Ok(SqliteStore::new(pool))
}

fn load_scoring(path: Option<PathBuf>) -> Result<ScoringConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading scoring config {}", path.display()))?;
            toml::from_str(&text).context("parsing scoring config")
        }
        None => Ok(ScoringConfig::builtin()),
    }
}

fn build_deps(
    store: SqliteStore,
    searxng_url: &str,
    scoring_config: Option<PathBuf>,
) -> Result<PipelineDeps> {
    let store = Arc::new(store);
    Ok(PipelineDeps {
        adapters: AdapterRegistry::new().register(Arc::new(SearxngAdapter::new(searxng_url))),
        generator: Arc::new(TemplateQueryGenerator),
        domains: store.clone(),
        candidates: store.clone(),
        sessions: store.clone(),
        errors: store,
        scoring: load_scoring(scoring_config)?,
        blacklist_store: None,
    })
}

async fn serve(store: SqliteStore, searxng_url: &str, scoring_config: Option<PathBuf>) -> Result<()> {
    let deps = build_deps(store, searxng_url, scoring_config)?;
    let pipeline = Pipeline::start(deps, PipelineConfig::default()).await?;
    info!("pipeline serving; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("signal handler")?;
    info!("shutting down");
    pipeline.shutdown().await;
    Ok(())
}

async fn trigger_once(
    store: SqliteStore,
    searxng_url: &str,
    scoring_config: Option<PathBuf>,
    input: TriggerInput,
    wait_secs: u64,
) -> Result<()> {
    let candidates = Arc::new(store.clone());
    let deps = build_deps(store, searxng_url, scoring_config)?;
    let pipeline = Pipeline::start(deps, PipelineConfig::default()).await?;

    let receipt = pipeline.trigger().execute(input).await?;
    println!("request_id:  {}", receipt.request_id);
    println!("session_id:  {}", receipt.session_id);
    println!("queries:     {}", receipt.queries_emitted);

    let status = pipeline
        .wait_for_request(receipt.request_id, Duration::from_secs(wait_secs))
        .await;
    match status {
        Some(status) => {
            println!("disposition: {}", status.disposition);
            println!("candidates:  {}", status.candidates_found);
            println!("duplicates:  {}", status.duplicates_detected);
            println!("blacklisted: {}", status.blacklisted_dropped);
            if let Some(avg) = status.average_confidence {
                println!("avg score:   {}", avg);
            }
            let rows = candidates.list_for_session(receipt.session_id).await?;
            for row in rows {
                println!("  [{}] {} - {}", row.confidence_score, row.url, row.title);
            }
        }
        None => println!("no status recorded for request"),
    }

    pipeline.shutdown().await;
    Ok(())
}

async fn status(store: SqliteStore, request_id: RequestId) -> Result<()> {
    match store.find_by_request(request_id).await? {
        Some(session) => {
            println!("session_id:  {}", session.session_id);
            println!("status:      {}", session.status);
            println!("queries:     {}", session.queries_emitted);
            println!("candidates:  {}", session.candidates_found);
            println!("duplicates:  {}", session.duplicates_detected);
            if let Some(avg) = session.average_confidence_score {
                println!("avg score:   {}", avg);
            }
        }
        None => println!("no session recorded for request {}", request_id),
    }
    Ok(())
}

async fn blacklist(store: SqliteStore, domain: &str, reason: &str) -> Result<()> {
    let registry = DomainRegistry::new(Arc::new(store));
    registry.mark_blacklisted(domain, reason).await?;
    println!("blacklisted {}", domain);
    Ok(())
}
