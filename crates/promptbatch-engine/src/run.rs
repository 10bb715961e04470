use std::sync::Arc;

use chrono::{DateTime, Utc};
use promptbatch_common::{
    error::{PromptbatchError, Result},
    time::now,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    config::BatchConfig,
    executor::RetryingExecutor,
    ingest::Ingestion,
    job::{Job, JobInput},
    ledger::{JobLedger, StatusCounts},
    params::GenerationParams,
    port::GenerationPort,
    progress::ProgressReporter,
    scheduler::BoundedScheduler,
    summary::{BatchSummary, PersistenceSink, RunMetadata, SummaryAggregator},
};

type Outcome = Option<std::result::Result<BatchSummary, String>>;

#[derive(Clone)]
pub struct BatchEngine {
    port: Arc<dyn GenerationPort>,
    aggregator: Arc<SummaryAggregator>,
    config: BatchConfig,
}

impl BatchEngine {
    pub fn new(
        port: Arc<dyn GenerationPort>,
        persistence: Arc<dyn PersistenceSink>,
        config: BatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            port,
            aggregator: Arc::new(SummaryAggregator::new(persistence)),
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn configured(&self, max_concurrency: Option<usize>, retry_limit: Option<u32>) -> Result<Self> {
        let config = self.config.with_overrides(max_concurrency, retry_limit);
        config.validate()?;
        Ok(Self {
            config,
            ..self.clone()
        })
    }

    pub async fn execute(&self, ingestion: Ingestion, reporter: ProgressReporter) -> Result<BatchSummary> {
        let run = self.prepare(ingestion, reporter)?;
        self.drive(&run).await
    }

    pub fn submit(&self, ingestion: Ingestion, reporter: ProgressReporter) -> Result<BatchRunHandle> {
        let run = Arc::new(self.prepare(ingestion, reporter)?);
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let engine = self.clone();
        let task_run = Arc::clone(&run);
        tokio::spawn(async move {
            let outcome = engine.drive(&task_run).await.map_err(|err| {
                error!(run_id = %task_run.run_id, error = %err, "batch run aborted");
                err.to_string()
            });
            outcome_tx.send_replace(Some(outcome));
        });

        Ok(BatchRunHandle {
            run,
            outcome: outcome_rx,
        })
    }

    fn prepare(&self, ingestion: Ingestion, reporter: ProgressReporter) -> Result<PreparedRun> {
        let Ingestion { jobs, params } = ingestion;
        let records = jobs
            .iter()
            .map(|(id, input)| Job::new(id.clone(), input.clone()))
            .collect();
        let ledger = Arc::new(JobLedger::new(records, self.config.retry_limit, reporter)?);

        Ok(PreparedRun {
            run_id: Uuid::new_v4().to_string(),
            max_concurrency: self.config.effective_concurrency(jobs.len()),
            retry_limit: self.config.retry_limit,
            jobs,
            params,
            ledger,
            cancel: CancellationToken::new(),
            started_at: now(),
        })
    }

    async fn drive(&self, run: &PreparedRun) -> Result<BatchSummary> {
        let executor = RetryingExecutor::new(
            Arc::clone(&self.port),
            Arc::clone(&run.ledger),
            run.params.clone(),
            &self.config,
            run.cancel.clone(),
        );
        let scheduler = BoundedScheduler::new(&self.config, run.jobs.len(), run.cancel.clone());

        info!(
            run_id = %run.run_id,
            total = run.jobs.len(),
            max_concurrency = scheduler.max_concurrency(),
            retry_limit = run.retry_limit,
            model = run.params.model_name(),
            port = self.port.name(),
            "batch run started"
        );
        let report = scheduler.run(&executor, &run.jobs).await;
        info!(
            run_id = %run.run_id,
            waves = report.waves_started,
            launched = report.jobs_launched,
            "scheduling finished"
        );

        let meta = RunMetadata {
            run_id: run.run_id.clone(),
            model: run.params.model_name().to_string(),
            max_concurrency: run.max_concurrency,
            retry_limit: run.retry_limit,
            cancelled: run.cancel.is_cancelled(),
            started_at: run.started_at,
            ended_at: now(),
        };
        self.aggregator.finalize(&meta, &run.ledger).await
    }
}

struct PreparedRun {
    run_id: String,
    max_concurrency: usize,
    retry_limit: u32,
    jobs: Vec<(String, JobInput)>,
    params: GenerationParams,
    ledger: Arc<JobLedger>,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct BatchRunHandle {
    run: Arc<PreparedRun>,
    outcome: watch::Receiver<Outcome>,
}

impl BatchRunHandle {
    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn model(&self) -> &'static str {
        self.run.params.model_name()
    }

    pub fn total(&self) -> usize {
        self.run.jobs.len()
    }

    pub fn max_concurrency(&self) -> usize {
        self.run.max_concurrency
    }

    pub fn retry_limit(&self) -> u32 {
        self.run.retry_limit
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.run.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.run.cancel.is_cancelled()
    }

    pub async fn status_counts(&self) -> StatusCounts {
        self.run.ledger.status_counts().await
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.run.ledger.snapshot().await
    }

    /// Requests cancellation. Jobs that have not started are failed at once;
    /// in-flight attempts run to completion without further retries.
    pub async fn cancel(&self) -> Result<usize> {
        if self.is_finished() {
            return Err(PromptbatchError::RunNotActive(self.run.run_id.clone()));
        }
        if !self.run.cancel.is_cancelled() {
            info!(run_id = %self.run.run_id, "batch run cancellation requested");
            self.run.cancel.cancel();
        }
        Ok(self.run.ledger.cancel_pending().await)
    }

    pub fn summary(&self) -> Option<Result<BatchSummary>> {
        self.outcome.borrow().clone().map(into_result)
    }

    pub async fn wait(&self) -> Result<BatchSummary> {
        let mut outcome = self.outcome.clone();
        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| {
                PromptbatchError::InternalError(format!(
                    "batch run {} stopped without a result",
                    self.run.run_id
                ))
            })?
            .clone();
        finished
            .map(into_result)
            .ok_or_else(|| PromptbatchError::InternalError("missing batch outcome".to_string()))?
    }
}

fn into_result(outcome: std::result::Result<BatchSummary, String>) -> Result<BatchSummary> {
    outcome.map_err(PromptbatchError::InternalError)
}
