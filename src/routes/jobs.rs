use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    app_error::AppError, handlers::job_handler, services::jobs::JobView,
    state::app_state::AppState,
};

pub async fn handle_create_job(
    state: State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    info!("Handling conversion job submission");
    job_handler::handle_create_job(state, multipart).await
}

pub async fn handle_job_status(
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> Result<Json<JobView>, AppError> {
    job_handler::handle_job_status(state, id).await
}

pub async fn handle_job_result(
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> Result<Response, AppError> {
    info!("Handling job result download for {}", id.0);
    job_handler::handle_job_result(state, id).await
}

pub async fn handle_delete_job(
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> Result<StatusCode, AppError> {
    job_handler::handle_delete_job(state, id).await
}
