use async_trait::async_trait;
use promptbatch_engine::port::{
    GenerationFailure, GenerationOutput, GenerationPort, GenerationRequest,
};
use tracing::{info, warn};

use crate::{client::LeonardoClient, config::LeonardoConfig, error::Result, payload::build_payload};

#[derive(Debug, Clone)]
pub struct LeonardoPort {
    client: LeonardoClient,
}

impl LeonardoPort {
    pub fn new(client: LeonardoClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: LeonardoConfig) -> Result<Self> {
        Ok(Self::new(LeonardoClient::new(config)?))
    }
}

#[async_trait]
impl GenerationPort for LeonardoPort {
    fn name(&self) -> &str {
        "leonardo"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationOutput, GenerationFailure> {
        let payload = build_payload(&request.prompt, &request.params)?;
        let generation_id = self.client.create_generation(&payload).await?;
        let record = self.client.poll_generation(&generation_id).await?;

        let artifacts = record.image_urls();
        if artifacts.is_empty() {
            warn!(job_id = %request.job_id, generation_id = %generation_id, "generation returned no images");
            return Err(GenerationFailure::provider(format!(
                "generation {generation_id} completed without images"
            )));
        }

        info!(
            job_id = %request.job_id,
            generation_id = %generation_id,
            images = artifacts.len(),
            "leonardo generation complete"
        );
        Ok(GenerationOutput {
            generation_id: Some(generation_id),
            artifacts,
        })
    }
}
