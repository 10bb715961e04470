use std::{
    collections::HashMap,
    sync::{Arc, RwLock as StdRwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use promptbatch_common::{
    error::{PromptbatchError, Result},
    time::now,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    ingest::Ingestion,
    progress::{ProgressReporter, ProgressSink, ProgressUpdate},
    run::{BatchEngine, BatchRunHandle},
    summary::BatchSummary,
};

#[derive(Debug, Default)]
pub struct RunProgress {
    latest: StdRwLock<Option<ProgressUpdate>>,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ProgressUpdate> {
        self.latest.read().ok().and_then(|latest| latest.clone())
    }
}

impl ProgressSink for RunProgress {
    fn report(&self, update: &ProgressUpdate) -> Result<()> {
        let mut latest = self
            .latest
            .write()
            .map_err(|_| PromptbatchError::InternalError("progress lock poisoned".to_string()))?;
        *latest = Some(update.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Cancelling,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    pub batch_id: String,
    pub model: String,
    pub state: RunState,
    pub total_jobs: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub max_concurrency: usize,
    pub retry_limit: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
struct RunRecord {
    handle: BatchRunHandle,
    progress: Arc<RunProgress>,
}

impl RunRecord {
    async fn view(&self) -> RunView {
        let handle = &self.handle;
        let counts = handle.status_counts().await;
        let outcome = handle.summary();

        let (state, finished_at, error) = match &outcome {
            Some(Ok(summary)) if summary.cancelled => {
                (RunState::Cancelled, Some(summary.ended_at), None)
            }
            Some(Ok(summary)) => (RunState::Finished, Some(summary.ended_at), None),
            Some(Err(err)) => (RunState::Finished, None, Some(err.to_string())),
            None if handle.is_cancelled() => (RunState::Cancelling, None, None),
            None => (RunState::Running, None, None),
        };

        let latest = self.progress.latest();
        let percent = ProgressUpdate {
            completed: counts.terminal(),
            total: handle.total(),
            message: String::new(),
        }
        .percent();

        RunView {
            batch_id: handle.run_id().to_string(),
            model: handle.model().to_string(),
            state,
            total_jobs: handle.total(),
            pending: counts.pending,
            processing: counts.processing,
            completed: counts.completed,
            failed: counts.failed,
            percent,
            message: latest.map(|update| update.message),
            max_concurrency: handle.max_concurrency(),
            retry_limit: handle.retry_limit(),
            started_at: handle.started_at(),
            finished_at,
            error,
        }
    }

    fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self.handle.summary()? {
            Ok(summary) => Some(summary.ended_at),
            Err(_) => Some(self.handle.started_at()),
        }
    }
}

pub struct BatchRunStore {
    runs: RwLock<HashMap<String, RunRecord>>,
    ttl: Duration,
}

impl BatchRunStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn start(&self, engine: &BatchEngine, ingestion: Ingestion) -> Result<RunView> {
        let progress = Arc::new(RunProgress::new());
        let reporter = ProgressReporter::new().with_sink(progress.clone());
        let handle = engine.submit(ingestion, reporter)?;
        self.insert(handle, progress).await
    }

    pub async fn insert(&self, handle: BatchRunHandle, progress: Arc<RunProgress>) -> Result<RunView> {
        let record = RunRecord { handle, progress };
        let view = record.view().await;
        self.runs
            .write()
            .await
            .insert(view.batch_id.clone(), record);
        debug!(batch_id = %view.batch_id, "batch run registered");
        Ok(view)
    }

    async fn record(&self, batch_id: &str) -> Result<RunRecord> {
        self.runs
            .read()
            .await
            .get(batch_id)
            .cloned()
            .ok_or_else(|| PromptbatchError::RunNotFound(batch_id.to_string()))
    }

    pub async fn handle(&self, batch_id: &str) -> Result<BatchRunHandle> {
        Ok(self.record(batch_id).await?.handle)
    }

    pub async fn get(&self, batch_id: &str) -> Result<RunView> {
        Ok(self.record(batch_id).await?.view().await)
    }

    pub async fn list(&self) -> Vec<RunView> {
        let records: Vec<RunRecord> = self.runs.read().await.values().cloned().collect();
        let mut views = Vec::with_capacity(records.len());
        for record in &records {
            views.push(record.view().await);
        }
        views.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        views
    }

    pub async fn summary(&self, batch_id: &str) -> Result<BatchSummary> {
        let record = self.record(batch_id).await?;
        record
            .handle
            .summary()
            .ok_or_else(|| PromptbatchError::RunInProgress(batch_id.to_string()))?
    }

    pub async fn cancel(&self, batch_id: &str) -> Result<RunView> {
        let record = self.record(batch_id).await?;
        let cancelled = record.handle.cancel().await?;
        info!(batch_id, cancelled, "batch run cancelled");
        Ok(record.view().await)
    }

    pub async fn remove(&self, batch_id: &str) -> Result<RunView> {
        let record = self.record(batch_id).await?;
        if !record.handle.is_finished() {
            return Err(PromptbatchError::RunInProgress(batch_id.to_string()));
        }
        let view = record.view().await;
        self.runs.write().await.remove(batch_id);
        info!(batch_id, "batch run record removed");
        Ok(view)
    }

    pub async fn evict_expired(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return 0;
        };
        self.evict_finished_before(now() - ttl).await
    }

    pub async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, record| record.finished_at().is_none_or(|ended| ended >= cutoff));
        let evicted = before - runs.len();
        if evicted > 0 {
            info!(evicted, remaining = runs.len(), "evicted expired batch runs");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}
