use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use promptbatch_engine::{BatchEngine, BatchRunStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;

pub struct AppState {
    pub engine: BatchEngine,
    pub store: Arc<BatchRunStore>,
}

impl AppState {
    pub fn new(engine: BatchEngine, store: Arc<BatchRunStore>) -> Self {
        Self { engine, store }
    }
}

pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health/live", get(handlers::health::health_live))
        .route("/batch/start", post(handlers::batch::start_batch))
        .route("/batch", get(handlers::batch::list_batches))
        .route(
            "/batch/{batch_id}",
            get(handlers::batch::get_batch).delete(handlers::batch::cancel_batch),
        )
        .route(
            "/batch/{batch_id}/summary",
            get(handlers::batch::get_batch_summary),
        )
        .route(
            "/batch/{batch_id}/record",
            delete(handlers::batch::delete_batch_record),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
