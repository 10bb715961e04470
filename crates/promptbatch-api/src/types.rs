use promptbatch_common::error::{PromptbatchError, Result};
use promptbatch_engine::{GenerationParams, Ingestion, store::RunState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DEFAULT_MODEL: &str = "phoenix";

#[derive(Debug, Clone, Deserialize)]
pub struct PromptRow {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartBatchRequest {
    pub prompts: Vec<PromptRow>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub retry_limit: Option<u32>,
}

impl StartBatchRequest {
    pub fn into_ingestion(self) -> Result<Ingestion> {
        let params = generation_params(self.config)?;
        Ingestion::from_rows(
            self.prompts.into_iter().map(|row| (row.id, row.prompt)),
            params,
        )
    }
}

fn generation_params(mut config: Map<String, Value>) -> Result<GenerationParams> {
    config
        .entry("model")
        .or_insert_with(|| Value::from(DEFAULT_MODEL));
    serde_json::from_value(Value::Object(config))
        .map_err(|err| PromptbatchError::InvalidArgument(format!("invalid generation config: {err}")))
}

#[derive(Debug, Clone, Serialize)]
pub struct StartBatchResponse {
    pub batch_id: String,
    pub total_jobs: usize,
    pub state: RunState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedBatchResponse {
    pub batch_id: String,
    pub removed: bool,
}
