use std::collections::HashMap;

use promptbatch_common::{
    error::{PromptbatchError, Result},
    time::now,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    job::{Job, JobStatus},
    port::GenerationOutput,
    progress::{ProgressReporter, ProgressUpdate},
};

pub const CANCELLED_ERROR: &str = "cancelled";

#[derive(Debug, Clone)]
pub enum Transition {
    BeginAttempt,
    Complete(GenerationOutput),
    Fail(String),
    Cancel,
    Abandon(String),
}

impl Transition {
    fn target(&self) -> JobStatus {
        match self {
            Self::BeginAttempt => JobStatus::Processing,
            Self::Complete(_) => JobStatus::Completed,
            Self::Fail(_) | Self::Cancel | Self::Abandon(_) => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn terminal(&self) -> usize {
        self.completed + self.failed
    }
}

#[derive(Debug)]
struct LedgerState {
    jobs: Vec<Job>,
    counts: StatusCounts,
    peak_processing: usize,
}

impl LedgerState {
    fn shift(&mut self, from: JobStatus, to: JobStatus) {
        if from == to {
            return;
        }
        *self.slot(from) -= 1;
        *self.slot(to) += 1;
        self.peak_processing = self.peak_processing.max(self.counts.processing);
    }

    fn slot(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Pending => &mut self.counts.pending,
            JobStatus::Processing => &mut self.counts.processing,
            JobStatus::Completed => &mut self.counts.completed,
            JobStatus::Failed => &mut self.counts.failed,
        }
    }
}

/// Authoritative per-job state for one batch run.
///
/// Every mutation goes through `transition_locked` under the single write
/// lock. Terminal transitions publish progress before the lock is released.
#[derive(Debug)]
pub struct JobLedger {
    index: HashMap<String, usize>,
    state: RwLock<LedgerState>,
    attempt_limit: u32,
    reporter: ProgressReporter,
}

impl JobLedger {
    pub fn new(jobs: Vec<Job>, retry_limit: u32, reporter: ProgressReporter) -> Result<Self> {
        let mut index = HashMap::with_capacity(jobs.len());
        for (position, job) in jobs.iter().enumerate() {
            if index.insert(job.id.clone(), position).is_some() {
                return Err(PromptbatchError::Ingestion(format!(
                    "duplicate job id: {}",
                    job.id
                )));
            }
        }

        let mut counts = StatusCounts::default();
        for job in &jobs {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                status => {
                    return Err(PromptbatchError::Ingestion(format!(
                        "job {} must start pending, found {status}",
                        job.id
                    )));
                }
            }
        }

        Ok(Self {
            index,
            state: RwLock::new(LedgerState {
                jobs,
                counts,
                peak_processing: 0,
            }),
            attempt_limit: retry_limit.saturating_add(1),
            reporter,
        })
    }

    pub fn total(&self) -> usize {
        self.index.len()
    }

    pub async fn apply(&self, job_id: &str, transition: Transition) -> Result<Job> {
        let position = *self
            .index
            .get(job_id)
            .ok_or_else(|| PromptbatchError::JobNotFound(job_id.to_string()))?;

        let mut state = self.state.write().await;
        self.transition_locked(&mut state, position, transition)
    }

    pub async fn cancel_pending(&self) -> usize {
        let mut state = self.state.write().await;
        let pending: Vec<usize> = state
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status == JobStatus::Pending)
            .map(|(position, _)| position)
            .collect();

        let mut cancelled = 0;
        for position in pending {
            if self.transition_locked(&mut state, position, Transition::Cancel).is_ok() {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub async fn fail_unsettled(&self, job_ids: &[String], message: &str) -> usize {
        let mut state = self.state.write().await;
        let mut failed = 0;
        for job_id in job_ids {
            let Some(&position) = self.index.get(job_id) else {
                continue;
            };
            if state.jobs[position].status != JobStatus::Processing {
                continue;
            }
            let abandon = Transition::Abandon(message.to_string());
            if self.transition_locked(&mut state, position, abandon).is_ok() {
                failed += 1;
            }
        }
        failed
    }

    fn transition_locked(
        &self,
        state: &mut LedgerState,
        position: usize,
        transition: Transition,
    ) -> Result<Job> {
        let from = state.jobs[position].status;
        let to = transition.target();
        let allowed = match (&transition, from) {
            (Transition::BeginAttempt, JobStatus::Pending | JobStatus::Processing) => {
                state.jobs[position].attempt_count < self.attempt_limit
            }
            (
                Transition::Complete(_) | Transition::Fail(_) | Transition::Abandon(_),
                JobStatus::Processing,
            ) => true,
            (Transition::Cancel, JobStatus::Pending) => true,
            _ => false,
        };
        if !allowed {
            return Err(PromptbatchError::InvalidTransition {
                job_id: state.jobs[position].id.clone(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let timestamp = now();
        let job = &mut state.jobs[position];
        match transition {
            Transition::BeginAttempt => {
                job.attempt_count += 1;
                if job.started_at.is_none() {
                    job.started_at = Some(timestamp);
                }
            }
            Transition::Complete(output) => {
                job.result = Some(output);
                job.ended_at = Some(timestamp);
            }
            Transition::Fail(message) | Transition::Abandon(message) => {
                job.error = Some(message);
                job.ended_at = Some(timestamp);
            }
            Transition::Cancel => {
                job.error = Some(CANCELLED_ERROR.to_string());
                job.ended_at = Some(timestamp);
            }
        }
        job.status = to;
        let updated = job.clone();
        state.shift(from, to);

        if to.is_terminal() {
            self.publish_terminal(state, &updated);
        }
        Ok(updated)
    }

    pub async fn announce(&self, message: impl Into<String>) {
        let state = self.state.read().await;
        let completed = state.counts.terminal();
        if completed >= self.total() {
            return;
        }
        self.reporter.publish(&ProgressUpdate {
            completed,
            total: self.total(),
            message: message.into(),
        });
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        let position = *self.index.get(job_id)?;
        Some(self.state.read().await.jobs[position].clone())
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        self.state.read().await.jobs.clone()
    }

    pub async fn status_counts(&self) -> StatusCounts {
        self.state.read().await.counts
    }

    pub async fn is_settled(&self) -> bool {
        self.state.read().await.counts.terminal() == self.total()
    }

    pub async fn peak_processing(&self) -> usize {
        self.state.read().await.peak_processing
    }

    fn publish_terminal(&self, state: &LedgerState, job: &Job) {
        let message = match job.status {
            JobStatus::Completed => {
                let artifacts = job.result.as_ref().map_or(0, |output| output.artifacts.len());
                format!("{} completed: {artifacts} artifact(s)", job.id)
            }
            _ => format!(
                "{} failed: {}",
                job.id,
                job.error.as_deref().unwrap_or("unknown error")
            ),
        };
        self.reporter.publish(&ProgressUpdate {
            completed: state.counts.terminal(),
            total: self.total(),
            message,
        });
    }
}
