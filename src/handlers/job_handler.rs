use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, info};

use crate::{
    app_error::AppError,
    config::types::{BackgroundKind, VideoSettings},
    handlers::{
        response::video_response,
        upload::{discard_upload, receive_upload, UploadedAudio},
    },
    models::AccessLogMeta,
    services::{
        jobs::{JobRecord, JobResult, JobView},
        workspace::{random_token, Workspace},
    },
    state::app_state::AppState,
};

/// Accepts an upload and encodes it on a background task.
pub async fn handle_create_job(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    // Refuse before reading the body so a full queue costs no disk.
    let slot = app_state.jobs.try_admit().ok_or_else(|| {
        AppError::ServerBusy("too many unfinished jobs, retry later".to_string())
    })?;

    let settings = app_state.config_manager.get_config().await.video;
    let workspace = Arc::new(app_state.new_workspace().await?);

    let form = receive_upload(&mut multipart, workspace.path()).await?;
    let background = form.background.unwrap_or(settings.default_background);
    let label = form.audio.label();

    let id = random_token();
    app_state.jobs.insert(JobRecord::new(
        id.clone(),
        background,
        form.audio.original_name.clone(),
        workspace.clone(),
    ));
    info!("Queued job {} for {}", id, label);

    tokio::spawn(run_job(
        app_state.clone(),
        id.clone(),
        settings,
        form.audio,
        workspace,
        background,
        slot,
    ));

    let body = Json(json!({
        "id": id,
        "status": "queued",
        "status_url": format!("/jobs/{}", id),
        "result_url": format!("/jobs/{}/result", id),
    }));
    let mut response = (StatusCode::ACCEPTED, body).into_response();
    response.extensions_mut().insert(AccessLogMeta {
        upload: label,
        error: None,
    });
    Ok(response)
}

async fn run_job(
    app_state: Arc<AppState>,
    id: String,
    settings: VideoSettings,
    audio: UploadedAudio,
    workspace: Arc<Workspace>,
    background: BackgroundKind,
    slot: OwnedSemaphorePermit,
) {
    let jobs = app_state.jobs.clone();
    let started_id = id.clone();
    let result = app_state
        .converter
        .convert_tracked(&settings, &audio.path, workspace.path(), background, move || {
            jobs.mark_running(&started_id)
        })
        .await;
    discard_upload(&audio).await;
    // The record keeps its own handle; release ours and the queue slot before publishing.
    drop(workspace);
    drop(slot);

    match result {
        Ok(video) => {
            info!("Job {} completed ({} bytes)", id, video.size_bytes);
            app_state.jobs.complete(&id, video);
        }
        Err(e) => {
            let failure = AppError::from(e).to_job_failure();
            error!("Job {} failed: {}", id, failure.error);
            app_state.jobs.fail(&id, failure);
        }
    }
}

pub async fn handle_job_status(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, AppError> {
    app_state
        .jobs
        .view(&id)
        .map(Json)
        .ok_or(AppError::JobNotFound(id))
}

pub async fn handle_job_result(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match app_state.jobs.result(&id) {
        JobResult::Ready(video, workspace) => {
            let settings = app_state.config_manager.get_config().await.video;
            video_response(&video, &settings.download_name, &id, workspace).await
        }
        JobResult::Pending(status) => Err(AppError::JobNotReady(id, status.as_str().to_string())),
        JobResult::Failed(failure) => Err(failure.into()),
        JobResult::NotFound => Err(AppError::JobNotFound(id)),
    }
}

pub async fn handle_delete_job(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if app_state.jobs.remove(&id) {
        info!("Deleted job {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::JobNotFound(id))
    }
}
