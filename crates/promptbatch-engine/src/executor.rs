use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::BatchConfig,
    job::{JobInput, JobStatus},
    ledger::{CANCELLED_ERROR, JobLedger, Transition},
    params::GenerationParams,
    port::{GenerationFailure, GenerationOutput, GenerationPort, GenerationRequest},
};

pub fn backoff(attempt: u32, unit: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    unit.saturating_mul(factor)
}

/// Runs one job to a terminal status with bounded retries.
///
/// Every failure kind is retried the same way, a panicking provider call
/// included. Cancellation is honoured between attempts only; an in-flight
/// provider call is never interrupted.
#[derive(Clone)]
pub struct RetryingExecutor {
    port: Arc<dyn GenerationPort>,
    ledger: Arc<JobLedger>,
    params: GenerationParams,
    retry_limit: u32,
    backoff_unit: Duration,
    cancel: CancellationToken,
}

impl RetryingExecutor {
    pub fn new(
        port: Arc<dyn GenerationPort>,
        ledger: Arc<JobLedger>,
        params: GenerationParams,
        config: &BatchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            ledger,
            params,
            retry_limit: config.retry_limit,
            backoff_unit: config.backoff_unit,
            cancel,
        }
    }

    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    pub async fn run(&self, job_id: &str, input: &JobInput) -> JobStatus {
        if self.cancel.is_cancelled() {
            return self.settle(job_id, Transition::Cancel).await;
        }

        loop {
            let attempt = match self.ledger.apply(job_id, Transition::BeginAttempt).await {
                Ok(job) => job.attempt_count,
                Err(err) => {
                    // Cancelled underneath us before the first attempt.
                    debug!(job_id, error = %err, "job not startable");
                    return self.current_status(job_id).await;
                }
            };

            let request = GenerationRequest {
                job_id: job_id.to_string(),
                prompt: input.prompt.clone(),
                params: self.params.clone(),
                attempt,
            };
            info!(job_id, attempt, port = self.port.name(), "generation attempt started");

            let failure = match self.generate(&request).await {
                Ok(output) => {
                    info!(
                        job_id,
                        attempt,
                        artifacts = output.artifacts.len(),
                        "generation completed"
                    );
                    return self.settle(job_id, Transition::Complete(output)).await;
                }
                Err(failure) => failure,
            };

            warn!(
                job_id,
                attempt,
                kind = %failure.kind,
                error = %failure.message,
                "generation attempt failed"
            );

            if attempt > self.retry_limit {
                error!(job_id, attempts = attempt, "job failed after exhausting retries");
                return self.settle(job_id, Transition::Fail(failure.to_string())).await;
            }

            let stop = Transition::Fail(format!(
                "{CANCELLED_ERROR} after attempt {attempt}: {failure}"
            ));
            if self.cancel.is_cancelled() {
                return self.settle(job_id, stop).await;
            }

            let delay = backoff(attempt, self.backoff_unit);
            debug!(job_id, attempt, delay_ms = delay.as_millis() as u64, "backing off");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    return self.settle(job_id, stop).await;
                }
            }
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationFailure> {
        match AssertUnwindSafe(self.port.generate(request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(GenerationFailure::provider(format!(
                "generation panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    async fn settle(&self, job_id: &str, transition: Transition) -> JobStatus {
        match self.ledger.apply(job_id, transition).await {
            Ok(job) => job.status,
            Err(err) => {
                warn!(job_id, error = %err, "ledger rejected terminal transition");
                self.current_status(job_id).await
            }
        }
    }

    async fn current_status(&self, job_id: &str) -> JobStatus {
        self.ledger
            .get(job_id)
            .await
            .map_or(JobStatus::Failed, |job| job.status)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::{
        progress::ProgressReporter,
        testing::{ScriptedPort, job_id, jobs, phoenix},
    };

    const LATENCY: Duration = Duration::from_millis(100);

    fn executor(
        port: Arc<ScriptedPort>,
        job_count: usize,
        retry_limit: u32,
        cancel: CancellationToken,
    ) -> RetryingExecutor {
        let ledger =
            Arc::new(JobLedger::new(jobs(job_count), retry_limit, ProgressReporter::new()).unwrap());
        let config = BatchConfig {
            retry_limit,
            ..BatchConfig::default()
        };
        RetryingExecutor::new(port, ledger, phoenix(), &config, cancel)
    }

    fn input() -> JobInput {
        JobInput::new("a lighthouse at dusk")
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let unit = Duration::from_millis(500);
        assert_eq!(backoff(1, unit), Duration::from_secs(1));
        assert_eq!(backoff(2, unit), Duration::from_secs(2));
        assert_eq!(backoff(3, unit), Duration::from_secs(4));
        assert_eq!(backoff(64, unit), unit.saturating_mul(u32::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_job_exhausts_retries() {
        let port = Arc::new(ScriptedPort::new(LATENCY).failing(&job_id(1)));
        let executor = executor(Arc::clone(&port), 1, 2, CancellationToken::new());

        let started = Instant::now();
        let status = executor.run(&job_id(1), &input()).await;

        assert_eq!(status, JobStatus::Failed);
        let job = executor.ledger().get(&job_id(1)).await.unwrap();
        assert_eq!(job.attempt_count, 3);
        assert!(job.error.as_deref().is_some_and(|error| !error.is_empty()));
        assert!(job.result.is_none());
        assert_eq!(port.calls_for(&job_id(1)), 3);
        // two backoffs of 1s and 2s plus three calls
        assert!(started.elapsed() >= Duration::from_secs(3) + LATENCY * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_then_success_completes_on_second_attempt() {
        let port = Arc::new(ScriptedPort::new(LATENCY).flaky(&job_id(1), 1));
        let executor = executor(Arc::clone(&port), 1, 2, CancellationToken::new());

        let status = executor.run(&job_id(1), &input()).await;

        assert_eq!(status, JobStatus::Completed);
        let job = executor.ledger().get(&job_id(1)).await.unwrap();
        assert_eq!(job.attempt_count, 2);
        assert!(job.error.is_none());
        assert!(job.result.is_some());
        assert!(job.started_at.unwrap() <= job.ended_at.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_limit_means_single_attempt() {
        let port = Arc::new(ScriptedPort::new(LATENCY).failing(&job_id(1)));
        let executor = executor(Arc::clone(&port), 1, 0, CancellationToken::new());

        assert_eq!(executor.run(&job_id(1), &input()).await, JobStatus::Failed);
        assert_eq!(port.calls_for(&job_id(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_port_is_retried_like_any_failure() {
        let port = Arc::new(ScriptedPort::new(LATENCY).panicking(&job_id(1)));
        let executor = executor(Arc::clone(&port), 1, 1, CancellationToken::new());

        assert_eq!(executor.run(&job_id(1), &input()).await, JobStatus::Failed);
        let job = executor.ledger().get(&job_id(1)).await.unwrap();
        assert_eq!(job.attempt_count, 2);
        assert!(job.error.unwrap().contains("scripted panic for job_001"));
        assert_eq!(port.calls_for(&job_id(1)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_never_calls_the_port() {
        let port = Arc::new(ScriptedPort::new(LATENCY));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = executor(Arc::clone(&port), 1, 2, cancel);

        assert_eq!(executor.run(&job_id(1), &input()).await, JobStatus::Failed);
        let job = executor.ledger().get(&job_id(1)).await.unwrap();
        assert_eq!(job.error.as_deref(), Some(CANCELLED_ERROR));
        assert_eq!(job.attempt_count, 0);
        assert!(port.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let port = Arc::new(ScriptedPort::new(LATENCY).failing(&job_id(1)));
        let cancel = CancellationToken::new();
        let executor = executor(Arc::clone(&port), 1, 3, cancel.clone());

        let task = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(&job_id(1), &input()).await })
        };
        // first attempt fails at 100ms, backoff would run until 1.1s
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), JobStatus::Failed);
        let job = executor.ledger().get(&job_id(1)).await.unwrap();
        assert_eq!(job.attempt_count, 1);
        assert!(job.error.unwrap().starts_with(CANCELLED_ERROR));
        assert_eq!(port.calls_for(&job_id(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_attempt_finishes_after_cancel() {
        let port = Arc::new(ScriptedPort::new(LATENCY));
        let cancel = CancellationToken::new();
        let executor = executor(Arc::clone(&port), 1, 3, cancel.clone());

        let task = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(&job_id(1), &input()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), JobStatus::Completed);
        assert_eq!(port.calls_for(&job_id(1)), 1);
    }
}
