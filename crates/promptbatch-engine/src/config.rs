use std::{path::PathBuf, time::Duration};

use promptbatch_common::error::{PromptbatchError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_RETRY_LIMIT: u32 = 2;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_millis(500);
pub const DEFAULT_WAVE_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RETRY_LIMIT: u32 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    #[default]
    Waves,
    SlidingWindow,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_concurrency: usize,
    pub retry_limit: u32,
    pub backoff_unit: Duration,
    pub wave_delay: Duration,
    pub mode: SchedulingMode,
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry_limit: DEFAULT_RETRY_LIMIT,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            wave_delay: DEFAULT_WAVE_DELAY,
            mode: SchedulingMode::Waves,
            output_dir: PathBuf::from("batch_output"),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(PromptbatchError::InvalidArgument(
                "max_concurrency must be positive".to_string(),
            ));
        }
        if self.retry_limit > MAX_RETRY_LIMIT {
            return Err(PromptbatchError::InvalidArgument(format!(
                "retry_limit must be at most {MAX_RETRY_LIMIT}, got {}",
                self.retry_limit
            )));
        }
        Ok(())
    }

    pub fn with_overrides(&self, max_concurrency: Option<usize>, retry_limit: Option<u32>) -> Self {
        Self {
            max_concurrency: max_concurrency.unwrap_or(self.max_concurrency),
            retry_limit: retry_limit.unwrap_or(self.retry_limit),
            ..self.clone()
        }
    }

    pub fn effective_concurrency(&self, job_count: usize) -> usize {
        self.max_concurrency.min(job_count).max(1)
    }
}
