use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use promptbatch_common::error::PromptbatchError;
use tokio::time::Instant;

use crate::{
    job::{Job, JobInput},
    params::{GenerationParams, PhoenixParams},
    port::{GenerationFailure, GenerationOutput, GenerationPort, GenerationRequest},
    progress::{ProgressReporter, ProgressUpdate},
    summary::{BatchSummary, PersistenceSink},
};

#[derive(Debug, Clone)]
pub(crate) struct CallRecord {
    pub job_id: String,
    pub started: Instant,
    pub finished: Instant,
}

/// In-memory provider with per-job failure scripts and concurrency tracking.
#[derive(Default)]
pub(crate) struct ScriptedPort {
    latency: Duration,
    always_fail: HashSet<String>,
    panicking: HashSet<String>,
    flaky: HashMap<String, u32>,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedPort {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn failing(mut self, job_id: &str) -> Self {
        self.always_fail.insert(job_id.to_string());
        self
    }

    pub fn panicking(mut self, job_id: &str) -> Self {
        self.panicking.insert(job_id.to_string());
        self
    }

    /// Fails the first `failures` attempts of `job_id`.
    pub fn flaky(mut self, job_id: &str, failures: u32) -> Self {
        self.flaky.insert(job_id.to_string(), failures);
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, job_id: &str) -> usize {
        self.calls().iter().filter(|call| call.job_id == job_id).count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationPort for ScriptedPort {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationFailure> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let started = Instant::now();
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().unwrap().push(CallRecord {
            job_id: request.job_id.clone(),
            started,
            finished: Instant::now(),
        });

        if self.panicking.contains(&request.job_id) {
            panic!("scripted panic for {}", request.job_id);
        }

        let scripted_failures = self.flaky.get(&request.job_id).copied().unwrap_or(0);
        if self.always_fail.contains(&request.job_id) || request.attempt <= scripted_failures {
            return Err(GenerationFailure::provider(format!(
                "provider rejected {} on attempt {}",
                request.job_id, request.attempt
            )));
        }

        Ok(GenerationOutput {
            generation_id: Some(format!("gen-{}-{}", request.job_id, request.attempt)),
            artifacts: vec![format!("https://cdn.example/{}.png", request.job_id)],
        })
    }
}

pub(crate) fn job_id(n: usize) -> String {
    format!("job_{n:03}")
}

pub(crate) fn jobs(count: usize) -> Vec<Job> {
    (1..=count)
        .map(|n| Job::new(job_id(n), JobInput::new(format!("a lighthouse at dusk #{n}"))))
        .collect()
}

pub(crate) fn phoenix() -> GenerationParams {
    GenerationParams::Phoenix(PhoenixParams::default())
}

pub(crate) fn recording_reporter() -> (ProgressReporter, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        move |completed: usize, total: usize, message: &str| {
            seen.lock().unwrap().push(ProgressUpdate {
                completed,
                total,
                message: message.to_string(),
            });
        }
    };
    (ProgressReporter::new().with_sink(Arc::new(sink)), seen)
}

#[derive(Default)]
pub(crate) struct MemorySink {
    saved: Mutex<Vec<BatchSummary>>,
    fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<BatchSummary> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn save(&self, summary: &BatchSummary) -> promptbatch_common::Result<()> {
        if self.fail {
            return Err(PromptbatchError::InternalError("disk full".to_string()));
        }
        self.saved.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
