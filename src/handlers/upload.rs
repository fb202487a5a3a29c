use axum::extract::multipart::{Field, Multipart};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::app_error::AppError;
use crate::config::types::BackgroundKind;
use crate::handlers::utils::sanitize_extension;
use crate::metrics::prometheus::UPLOAD_BYTES_TOTAL;
use crate::services::workspace::random_token;

/// Canonical audio field name; `audio_file` is accepted as an alias.
pub const AUDIO_FIELD: &str = "audio";
const AUDIO_FIELD_ALIAS: &str = "audio_file";
const BACKGROUND_FIELD: &str = "background";

#[derive(Debug)]
pub struct UploadedAudio {
    pub path: PathBuf,
    pub original_name: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct ConvertForm {
    pub audio: UploadedAudio,
    /// Requested background, if the form picked one.
    pub background: Option<BackgroundKind>,
}

/// Reads the multipart form, streaming the audio part into `dir`.
pub async fn receive_upload(multipart: &mut Multipart, dir: &Path) -> Result<ConvertForm, AppError> {
    let mut audio: Option<UploadedAudio> = None;
    let mut background: Option<BackgroundKind> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            AUDIO_FIELD | AUDIO_FIELD_ALIAS if audio.is_none() => {
                audio = Some(save_audio_field(field, dir).await?);
            }
            BACKGROUND_FIELD => {
                let value = field.text().await?;
                if value.trim().is_empty() {
                    continue;
                }
                background = Some(BackgroundKind::parse(&value).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Invalid 'background' value `{}`; expected `color` or `image`",
                        value.trim()
                    ))
                })?);
            }
            _ => {
                debug!("Ignoring multipart field `{}`", name);
            }
        }
    }

    let audio = audio.ok_or_else(|| {
        AppError::BadRequest(format!(
            "Missing '{}' file field in multipart form data",
            AUDIO_FIELD
        ))
    })?;

    Ok(ConvertForm { audio, background })
}

async fn save_audio_field(mut field: Field<'_>, dir: &Path) -> Result<UploadedAudio, AppError> {
    let original_name = field.file_name().map(|s| s.to_string());
    if matches!(original_name.as_deref(), Some(n) if n.trim().is_empty()) {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }

    let file_name = match original_name.as_deref().and_then(sanitize_extension) {
        Some(ext) => format!("audio_{}.{}", random_token(), ext),
        None => format!("audio_{}", random_token()),
    };
    let path = dir.join(file_name);

    let mut file = File::create(&path).await?;
    let mut size_bytes: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        size_bytes += chunk.len() as u64;
    }
    file.flush().await?;

    if size_bytes == 0 {
        return Err(AppError::BadRequest("Uploaded audio file is empty".to_string()));
    }

    UPLOAD_BYTES_TOTAL.inc_by(size_bytes as f64);
    info!(
        "Saved upload {:?} ({} bytes) to {}",
        original_name.as_deref().unwrap_or("-"),
        size_bytes,
        path.display()
    );

    Ok(UploadedAudio {
        path,
        original_name,
        size_bytes,
    })
}

/// Deletes the uploaded audio once the encoder is done with it.
pub async fn discard_upload(audio: &UploadedAudio) {
    if let Err(e) = tokio::fs::remove_file(&audio.path).await {
        warn!("Failed to remove upload {}: {}", audio.path.display(), e);
    }
}

impl UploadedAudio {
    /// Label for log lines: the client file name, or the generated one.
    pub fn label(&self) -> String {
        match &self.original_name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}
