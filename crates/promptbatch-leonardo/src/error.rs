use std::time::Duration;

use promptbatch_engine::port::{FailureKind, GenerationFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeonardoError {
    #[error("missing configuration: {0}")]
    Config(String),
    #[error("leonardo api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("generation {0} failed")]
    GenerationFailed(String),
    #[error("generation {generation_id} not complete after {}s", waited.as_secs())]
    Timeout {
        generation_id: String,
        waited: Duration,
    },
    #[error("invalid generation parameters: {0}")]
    InvalidParams(String),
}

impl LeonardoError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Api { status, .. } if matches!(status, 400 | 422) => FailureKind::Validation,
            Self::InvalidParams(_) | Self::Config(_) => FailureKind::Validation,
            Self::Network(_) => FailureKind::Network,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Api { .. } | Self::UnexpectedResponse(_) | Self::GenerationFailed(_) => {
                FailureKind::Provider
            }
        }
    }
}

impl From<reqwest::Error> for LeonardoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::UnexpectedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<LeonardoError> for GenerationFailure {
    fn from(err: LeonardoError) -> Self {
        GenerationFailure::new(err.kind(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LeonardoError>;
