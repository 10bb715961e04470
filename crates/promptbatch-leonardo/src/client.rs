use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    config::LeonardoConfig,
    error::{LeonardoError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Pending,
    Complete,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedImage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRecord {
    #[serde(default = "pending")]
    pub status: GenerationStatus,
    #[serde(default)]
    pub generated_images: Vec<GeneratedImage>,
}

impl GenerationRecord {
    pub fn image_urls(&self) -> Vec<String> {
        self.generated_images
            .iter()
            .filter_map(|image| image.url.clone())
            .collect()
    }
}

fn pending() -> GenerationStatus {
    GenerationStatus::Pending
}

#[derive(Deserialize)]
struct CreateGenerationResponse {
    #[serde(rename = "sdGenerationJob")]
    job: Option<CreatedJob>,
}

#[derive(Deserialize)]
struct CreatedJob {
    #[serde(rename = "generationId")]
    generation_id: String,
}

#[derive(Deserialize)]
struct GenerationEnvelope {
    generations_by_pk: Option<GenerationRecord>,
}

#[derive(Debug, Clone)]
pub struct LeonardoClient {
    http: reqwest::Client,
    config: LeonardoConfig,
}

impl LeonardoClient {
    pub fn new(config: LeonardoConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LeonardoError::Config("leonardo api key is required".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LeonardoError::Config(format!("failed to build http client: {err}")))?;
        info!(base_url = %config.base_url, "leonardo client initialized");
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &LeonardoConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(LeonardoError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response)
    }

    pub async fn create_generation(&self, payload: &Value) -> Result<String> {
        let response = self
            .send(self.http.post(self.url("/generations")).json(payload))
            .await?;
        let created: CreateGenerationResponse = response.json().await?;
        let generation_id = created
            .job
            .map(|job| job.generation_id)
            .ok_or_else(|| LeonardoError::UnexpectedResponse("missing sdGenerationJob".to_string()))?;
        info!(generation_id = %generation_id, "generation job created");
        Ok(generation_id)
    }

    pub async fn generation(&self, generation_id: &str) -> Result<GenerationRecord> {
        let response = self
            .send(self.http.get(self.url(&format!("/generations/{generation_id}"))))
            .await?;
        let envelope: GenerationEnvelope = response.json().await?;
        Ok(envelope.generations_by_pk.unwrap_or(GenerationRecord {
            status: GenerationStatus::Pending,
            generated_images: Vec::new(),
        }))
    }

    pub async fn poll_generation(&self, generation_id: &str) -> Result<GenerationRecord> {
        let started = Instant::now();
        loop {
            let waited = started.elapsed();
            if waited > self.config.timeout {
                return Err(LeonardoError::Timeout {
                    generation_id: generation_id.to_string(),
                    waited,
                });
            }

            let record = self.generation(generation_id).await?;
            debug!(generation_id, status = ?record.status, "generation polled");
            match record.status {
                GenerationStatus::Complete => return Ok(record),
                GenerationStatus::Failed => {
                    return Err(LeonardoError::GenerationFailed(generation_id.to_string()));
                }
                GenerationStatus::Pending | GenerationStatus::Unknown => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "unknown error".to_string()
            } else {
                body.to_string()
            }
        })
}
