use std::{ops::Range, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::{BatchConfig, SchedulingMode},
    executor::RetryingExecutor,
    job::JobInput,
};

const ABANDONED_ERROR: &str = "job task terminated before settling";

pub fn partition_waves(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    pub mode: SchedulingMode,
    pub max_concurrency: usize,
    pub waves_started: usize,
    pub jobs_launched: usize,
}

#[derive(Debug, Clone)]
pub struct BoundedScheduler {
    max_concurrency: usize,
    wave_delay: Duration,
    mode: SchedulingMode,
    cancel: CancellationToken,
}

impl BoundedScheduler {
    pub fn new(config: &BatchConfig, job_count: usize, cancel: CancellationToken) -> Self {
        Self {
            max_concurrency: config.effective_concurrency(job_count),
            wave_delay: config.wave_delay,
            mode: config.mode,
            cancel,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn run(
        &self,
        executor: &RetryingExecutor,
        jobs: &[(String, JobInput)],
    ) -> ScheduleReport {
        let mut report = ScheduleReport {
            mode: self.mode,
            max_concurrency: self.max_concurrency,
            waves_started: 0,
            jobs_launched: 0,
        };

        match self.mode {
            SchedulingMode::Waves => self.run_waves(executor, jobs, &mut report).await,
            SchedulingMode::SlidingWindow => self.run_window(executor, jobs, &mut report).await,
        }

        let ledger = executor.ledger();
        let ids: Vec<String> = jobs.iter().map(|(job_id, _)| job_id.clone()).collect();
        let abandoned = ledger.fail_unsettled(&ids, ABANDONED_ERROR).await;
        if abandoned > 0 {
            warn!(abandoned, "jobs were left unsettled by the scheduler");
        }
        let never_started = ledger.cancel_pending().await;
        if never_started > 0 {
            if self.cancel.is_cancelled() {
                info!(cancelled = never_started, "cancelled jobs that never started");
            } else {
                warn!(never_started, "jobs were never launched");
            }
        }

        report
    }

    async fn run_waves(
        &self,
        executor: &RetryingExecutor,
        jobs: &[(String, JobInput)],
        report: &mut ScheduleReport,
    ) {
        let waves = partition_waves(jobs.len(), self.max_concurrency);
        let wave_count = waves.len();

        for (index, range) in waves.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(wave = index + 1, waves = wave_count, "run cancelled; skipping remaining waves");
                break;
            }

            let wave = &jobs[range];
            info!(
                wave = index + 1,
                waves = wave_count,
                size = wave.len(),
                "starting wave"
            );
            executor
                .ledger()
                .announce(format!(
                    "processing wave {}/{wave_count}: {} job(s)",
                    index + 1,
                    wave.len()
                ))
                .await;

            let mut tasks = JoinSet::new();
            for (job_id, input) in wave {
                let executor = executor.clone();
                let job_id = job_id.clone();
                let input = input.clone();
                tasks.spawn(async move { executor.run(&job_id, &input).await });
            }
            report.waves_started += 1;
            report.jobs_launched += wave.len();
            drain(&mut tasks).await;

            let ids: Vec<String> = wave.iter().map(|(job_id, _)| job_id.clone()).collect();
            executor.ledger().fail_unsettled(&ids, ABANDONED_ERROR).await;

            if index + 1 < wave_count && !self.wave_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.wave_delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }
    }

    async fn run_window(
        &self,
        executor: &RetryingExecutor,
        jobs: &[(String, JobInput)],
        report: &mut ScheduleReport,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (job_id, input) in jobs {
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => permit,
                _ = self.cancel.cancelled() => break,
            };
            let Ok(permit) = permit else {
                error!("scheduler semaphore closed unexpectedly");
                break;
            };

            let executor = executor.clone();
            let job_id = job_id.clone();
            let input = input.clone();
            tasks.spawn(async move {
                let _permit = permit;
                executor.run(&job_id, &input).await
            });
            report.jobs_launched += 1;
        }

        drain(&mut tasks).await;
    }
}

async fn drain<T: 'static>(tasks: &mut JoinSet<T>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            error!(error = %err, "job task terminated abnormally");
        }
    }
}
