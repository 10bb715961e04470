use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::GenerationParams;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub job_id: String,
    pub prompt: String,
    pub params: GenerationParams,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Validation,
    Network,
    Provider,
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Provider => "provider",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} failure: {message}")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Provider, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }
}

#[async_trait]
pub trait GenerationPort: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationFailure>;
}
