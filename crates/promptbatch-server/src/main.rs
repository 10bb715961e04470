use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use promptbatch_api::{AppState, api_router};
use promptbatch_engine::{
    BatchConfig, BatchEngine, BatchRunStore, GenerationPort, JsonFileSummarySink,
    PersistenceSink, SchedulingMode,
};
use promptbatch_leonardo::{LeonardoConfig, LeonardoPort};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promptbatch", about = "Batch image generation server")]
struct Cli {
    #[arg(long, env = "PROMPTBATCH_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PROMPTBATCH_PORT", default_value = "8000")]
    port: u16,

    #[arg(long, env = "PROMPTBATCH_OUTPUT_DIR", default_value = "batch_output")]
    output_dir: PathBuf,

    #[arg(long, env = "PROMPTBATCH_MAX_CONCURRENCY", default_value_t = promptbatch_engine::config::DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    #[arg(long, env = "PROMPTBATCH_RETRY_LIMIT", default_value_t = promptbatch_engine::config::DEFAULT_RETRY_LIMIT)]
    retry_limit: u32,

    /// Start jobs as slots free up instead of in fixed waves.
    #[arg(long, default_value_t = false)]
    sliding_window: bool,

    /// How long finished runs stay queryable.
    #[arg(long, env = "PROMPTBATCH_RUN_TTL_SECS", default_value_t = 24 * 60 * 60)]
    run_ttl_secs: u64,

    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::from_default_env().add_directive("promptbatch=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let addr = format!("{}:{}", cli.host, cli.port);
    tokio::fs::create_dir_all(&cli.output_dir).await?;

    let config = BatchConfig {
        max_concurrency: cli.max_concurrency,
        retry_limit: cli.retry_limit,
        mode: if cli.sliding_window {
            SchedulingMode::SlidingWindow
        } else {
            SchedulingMode::Waves
        },
        output_dir: cli.output_dir.clone(),
        ..BatchConfig::default()
    };

    let port: Arc<dyn GenerationPort> =
        Arc::new(LeonardoPort::from_config(LeonardoConfig::from_env()?)?);
    let persistence: Arc<dyn PersistenceSink> =
        Arc::new(JsonFileSummarySink::new(config.output_dir.clone()));
    let engine = BatchEngine::new(port, persistence, config)?;
    info!(
        max_concurrency = engine.config().max_concurrency,
        retry_limit = engine.config().retry_limit,
        mode = ?engine.config().mode,
        output_dir = %engine.config().output_dir.display(),
        "batch engine configured"
    );

    let ttl = Duration::from_secs(cli.run_ttl_secs);
    let store = Arc::new(BatchRunStore::new(ttl));
    let sweeper = Arc::clone(&store);
    let sweep_every = ttl.clamp(Duration::from_secs(1), Duration::from_secs(10 * 60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            sweeper.evict_expired().await;
        }
    });
    info!(ttl_secs = cli.run_ttl_secs, "run record eviction enabled");

    let app = api_router(Arc::new(AppState::new(engine, store)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("promptbatch server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
