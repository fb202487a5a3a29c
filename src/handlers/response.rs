use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::app_error::AppError;
use crate::handlers::utils::attachment_disposition;
use crate::models::AccessLogMeta;
use crate::services::composer::GeneratedVideo;
use crate::services::workspace::Workspace;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streams `video` as an MP4 attachment.
///
/// The body stream holds `workspace`, so the directory outlives the transfer
/// and is removed once the body completes or the client goes away.
pub async fn video_response(
    video: &GeneratedVideo,
    download_name: &str,
    upload_label: &str,
    workspace: Arc<Workspace>,
) -> Result<Response, AppError> {
    let file = File::open(&video.path).await?;
    let length = file.metadata().await?.len();

    let stream = futures::stream::try_unfold((file, workspace), |(mut file, workspace)| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), (file, workspace))))
    });

    let disposition = HeaderValue::from_str(&attachment_disposition(download_name))
        .map_err(|e| AppError::InternalServerError(format!("Invalid download name: {}", e)))?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"))
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    response.extensions_mut().insert(AccessLogMeta {
        upload: upload_label.to_string(),
        error: None,
    });
    Ok(response)
}
