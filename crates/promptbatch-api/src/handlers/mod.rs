pub mod batch;
pub mod health;

use axum::{Json, http::StatusCode, response::IntoResponse};
use promptbatch_common::error::PromptbatchError;
use tracing::error;

pub struct ApiError(pub PromptbatchError);

impl From<PromptbatchError> for ApiError {
    fn from(value: PromptbatchError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            PromptbatchError::InvalidArgument(_)
            | PromptbatchError::Ingestion(_)
            | PromptbatchError::RunNotActive(_) => StatusCode::BAD_REQUEST,
            PromptbatchError::RunNotFound(_) | PromptbatchError::JobNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PromptbatchError::RunInProgress(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        (
            status,
            Json(serde_json::json!({
                "code": self.0.error_code(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}
