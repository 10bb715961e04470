use std::path::PathBuf;

use async_trait::async_trait;
use promptbatch_common::{
    error::{PromptbatchError, Result},
    time::format_file_stamp,
};
use tokio::fs;
use tracing::info;

use crate::summary::{BatchSummary, PersistenceSink};

#[derive(Debug, Clone)]
pub struct JsonFileSummarySink {
    root: PathBuf,
}

impl JsonFileSummarySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(format!("batch_{run_id}"))
    }

    pub fn summary_path(&self, summary: &BatchSummary) -> PathBuf {
        self.run_dir(&summary.run_id).join(format!(
            "batch_summary_{}.json",
            format_file_stamp(&summary.ended_at)
        ))
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSummarySink {
    async fn save(&self, summary: &BatchSummary) -> Result<()> {
        let path = self.summary_path(summary);
        let payload = serde_json::to_vec_pretty(summary).map_err(|err| {
            PromptbatchError::InternalError(format!(
                "failed to serialize batch summary {}: {err}",
                summary.run_id
            ))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, payload).await?;
        fs::rename(&tmp_path, &path).await?;

        info!(run_id = %summary.run_id, path = %path.display(), "batch summary saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn summary(run_id: &str) -> BatchSummary {
        let at = Utc.with_ymd_and_hms(2024, 5, 4, 3, 2, 1).unwrap();
        BatchSummary {
            run_id: run_id.to_string(),
            model: "flux".to_string(),
            total_jobs: 0,
            completed: 0,
            failed: 0,
            cancelled: false,
            max_concurrency: 1,
            retry_limit: 0,
            duration_seconds: 0.0,
            started_at: at,
            ended_at: at,
            failed_jobs: Vec::new(),
            jobs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn writes_summary_json_under_run_dir() {
        let root = std::env::temp_dir().join(format!("promptbatch-sink-{}", uuid::Uuid::new_v4()));
        let sink = JsonFileSummarySink::new(&root);
        let summary = summary("abc");

        sink.save(&summary).await.unwrap();

        let path = sink.summary_path(&summary);
        assert_eq!(
            path,
            root.join("batch_abc").join("batch_summary_20240504_030201.json")
        );
        let bytes = fs::read(&path).await.unwrap();
        let decoded: BatchSummary = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, summary);
        assert!(!path.with_extension("tmp").exists());

        fs::remove_dir_all(&root).await.unwrap();
    }
}
