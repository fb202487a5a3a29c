use axum::{
    extract::{Multipart, State},
    response::Response,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    app_error::AppError,
    handlers::{
        response::video_response,
        upload::{discard_upload, receive_upload},
    },
    state::app_state::AppState,
};

/// Synchronous conversion: receive → save → convert → respond.
pub async fn handle_convert(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let settings = app_state.config_manager.get_config().await.video;
    let workspace = Arc::new(app_state.new_workspace().await?);

    let form = receive_upload(&mut multipart, workspace.path()).await?;
    let background = form.background.unwrap_or(settings.default_background);
    info!(
        "Converting {} with {} background",
        form.audio.label(),
        background.as_str()
    );

    let result = app_state
        .converter
        .convert(&settings, &form.audio.path, workspace.path(), background)
        .await;
    discard_upload(&form.audio).await;
    let video = result?;

    video_response(
        &video,
        &settings.download_name,
        &form.audio.label(),
        workspace,
    )
    .await
}
