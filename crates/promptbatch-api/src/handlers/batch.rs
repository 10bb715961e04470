use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use promptbatch_common::error::PromptbatchError;
use promptbatch_engine::{BatchSummary, RunView};
use tracing::info;

use crate::{
    handlers::ApiError,
    router::AppState,
    types::{RemovedBatchResponse, StartBatchRequest, StartBatchResponse},
};

pub async fn start_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartBatchRequest>, JsonRejection>,
) -> Result<Json<StartBatchResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|rejection| PromptbatchError::InvalidArgument(rejection.body_text()))?;
    let engine = state
        .engine
        .configured(payload.max_concurrency, payload.retry_limit)?;
    let ingestion = payload.into_ingestion()?;
    let view = state.store.start(&engine, ingestion).await?;

    info!(
        batch_id = %view.batch_id,
        total_jobs = view.total_jobs,
        model = %view.model,
        "batch submitted"
    );
    Ok(Json(StartBatchResponse {
        batch_id: view.batch_id,
        total_jobs: view.total_jobs,
        state: view.state,
    }))
}

pub async fn list_batches(State(state): State<Arc<AppState>>) -> Json<Vec<RunView>> {
    Json(state.store.list().await)
}

pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    Ok(Json(state.store.get(&batch_id).await?))
}

pub async fn get_batch_summary(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchSummary>, ApiError> {
    Ok(Json(state.store.summary(&batch_id).await?))
}

pub async fn cancel_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    Ok(Json(state.store.cancel(&batch_id).await?))
}

pub async fn delete_batch_record(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<RemovedBatchResponse>, ApiError> {
    let view = state.store.remove(&batch_id).await?;
    Ok(Json(RemovedBatchResponse {
        batch_id: view.batch_id,
        removed: true,
    }))
}
