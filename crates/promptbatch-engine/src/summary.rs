use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promptbatch_common::{
    error::{PromptbatchError, Result},
    time::elapsed_seconds,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    job::{Job, JobInput, JobStatus},
    ledger::JobLedger,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    pub id: String,
    pub input: JobInput,
    pub error: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub id: String,
    pub status: JobStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub model: String,
    pub total_jobs: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub max_concurrency: usize,
    pub retry_limit: u32,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub failed_jobs: Vec<FailedJob>,
    pub jobs: Vec<JobOutcome>,
}

#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub run_id: String,
    pub model: String,
    pub max_concurrency: usize,
    pub retry_limit: u32,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn save(&self, summary: &BatchSummary) -> Result<()>;
}

pub struct SummaryAggregator {
    sink: Arc<dyn PersistenceSink>,
}

impl SummaryAggregator {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }

    pub fn summarize(meta: &RunMetadata, jobs: &[Job]) -> BatchSummary {
        let mut completed = 0;
        let mut failed_jobs = Vec::new();
        let mut outcomes = Vec::with_capacity(jobs.len());

        for job in jobs {
            match job.status {
                JobStatus::Completed => completed += 1,
                JobStatus::Failed => failed_jobs.push(FailedJob {
                    id: job.id.clone(),
                    input: job.input.clone(),
                    error: job.error.clone().unwrap_or_default(),
                    attempts: job.attempt_count,
                }),
                JobStatus::Pending | JobStatus::Processing => {}
            }

            outcomes.push(JobOutcome {
                id: job.id.clone(),
                status: job.status,
                attempts: job.attempt_count,
                artifacts: job
                    .result
                    .as_ref()
                    .map(|output| output.artifacts.clone())
                    .unwrap_or_default(),
                error: job.error.clone(),
                started_at: job.started_at,
                ended_at: job.ended_at,
            });
        }

        BatchSummary {
            run_id: meta.run_id.clone(),
            model: meta.model.clone(),
            total_jobs: jobs.len(),
            completed,
            failed: failed_jobs.len(),
            cancelled: meta.cancelled,
            max_concurrency: meta.max_concurrency,
            retry_limit: meta.retry_limit,
            duration_seconds: elapsed_seconds(&meta.started_at, &meta.ended_at),
            started_at: meta.started_at,
            ended_at: meta.ended_at,
            failed_jobs,
            jobs: outcomes,
        }
    }

    /// Reduces a settled ledger and hands the result to the persistence sink.
    ///
    /// Persistence failures are logged; the summary is still returned.
    pub async fn finalize(&self, meta: &RunMetadata, ledger: &JobLedger) -> Result<BatchSummary> {
        if !ledger.is_settled().await {
            return Err(PromptbatchError::InternalError(format!(
                "batch run {} still has unsettled jobs",
                meta.run_id
            )));
        }

        let summary = Self::summarize(meta, &ledger.snapshot().await);
        info!(
            run_id = %summary.run_id,
            completed = summary.completed,
            failed = summary.failed,
            total = summary.total_jobs,
            duration_seconds = summary.duration_seconds,
            "batch run finished"
        );

        if let Err(err) = self.sink.save(&summary).await {
            warn!(run_id = %summary.run_id, error = %err, "failed to persist batch summary");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        ledger::Transition,
        port::GenerationOutput,
        progress::ProgressReporter,
        testing::{MemorySink, job_id, jobs},
    };

    fn meta() -> RunMetadata {
        let started_at = Utc::now();
        RunMetadata {
            run_id: "run-1".to_string(),
            model: "phoenix".to_string(),
            max_concurrency: 2,
            retry_limit: 1,
            cancelled: false,
            started_at,
            ended_at: started_at + Duration::milliseconds(2500),
        }
    }

    async fn settled_ledger() -> JobLedger {
        let ledger = JobLedger::new(jobs(3), 1, ProgressReporter::new()).unwrap();
        for n in 1..=3 {
            ledger.apply(&job_id(n), Transition::BeginAttempt).await.unwrap();
        }
        ledger
            .apply(
                &job_id(1),
                Transition::Complete(GenerationOutput {
                    generation_id: None,
                    artifacts: vec!["a.png".to_string(), "b.png".to_string()],
                }),
            )
            .await
            .unwrap();
        ledger
            .apply(&job_id(2), Transition::Fail("provider failure: nsfw".to_string()))
            .await
            .unwrap();
        ledger
            .apply(
                &job_id(3),
                Transition::Complete(GenerationOutput {
                    generation_id: None,
                    artifacts: vec!["c.png".to_string()],
                }),
            )
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn reduces_counts_failures_and_duration() {
        let sink = Arc::new(MemorySink::default());
        let aggregator = SummaryAggregator::new(sink.clone());

        let summary = aggregator.finalize(&meta(), &settled_ledger().await).await.unwrap();

        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed + summary.failed, summary.total_jobs);
        assert_eq!(summary.duration_seconds, 2.5);
        assert_eq!(summary.failed_jobs[0].id, job_id(2));
        assert_eq!(summary.failed_jobs[0].error, "provider failure: nsfw");
        assert_eq!(summary.failed_jobs[0].input.prompt, "a lighthouse at dusk #2");
        assert_eq!(summary.jobs[0].artifacts.len(), 2);
        assert_eq!(sink.saved(), vec![summary]);
    }

    #[tokio::test]
    async fn persistence_failure_still_yields_summary() {
        let sink = Arc::new(MemorySink::failing());
        let aggregator = SummaryAggregator::new(sink);

        let summary = aggregator.finalize(&meta(), &settled_ledger().await).await.unwrap();
        assert_eq!(summary.completed, 2);
    }

    #[tokio::test]
    async fn refuses_unsettled_ledgers() {
        let aggregator = SummaryAggregator::new(Arc::new(MemorySink::default()));
        let ledger = JobLedger::new(jobs(1), 0, ProgressReporter::new()).unwrap();
        assert!(aggregator.finalize(&meta(), &ledger).await.is_err());
    }
}
