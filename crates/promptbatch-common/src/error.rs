use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptbatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("ingestion failed: {0}")]
    Ingestion(String),
    #[error("batch run not found: {0}")]
    RunNotFound(String),
    #[error("batch run is not running: {0}")]
    RunNotActive(String),
    #[error("batch run is still in progress: {0}")]
    RunInProgress(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PromptbatchError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Ingestion(_) => "InvalidBatch",
            Self::RunNotFound(_) => "NoSuchBatch",
            Self::RunNotActive(_) => "BatchNotRunning",
            Self::RunInProgress(_) => "BatchInProgress",
            Self::JobNotFound(_) => "NoSuchJob",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::InternalError(_) => "InternalError",
            Self::Io(_) => "InternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, PromptbatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_surface_as_internal() {
        let err: PromptbatchError = std::io::Error::other("disk gone").into();
        assert_eq!(err.error_code(), "InternalError");
        assert_eq!(err.to_string(), "disk gone");
    }

    #[test]
    fn transition_errors_name_both_states() {
        let err = PromptbatchError::InvalidTransition {
            job_id: "job_001".to_string(),
            from: "completed".to_string(),
            to: "processing".to_string(),
        };
        assert_eq!(err.error_code(), "InvalidTransition");
        assert!(err.to_string().contains("completed -> processing"));
    }
}
