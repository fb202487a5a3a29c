use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failures at the boundary between the conversion step and the HTTP layer.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported or unreadable audio: {0}")]
    UnsupportedFormat(String),
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    #[error("Encoding did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Background image not found: {}", .0.display())]
    MissingAsset(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video track source for a composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    /// Solid frame, color in ffmpeg `0xrrggbb` form.
    Color { color: String },
    /// Still image, fitted into the frame and padded with `pad_color`.
    Image { path: PathBuf, pad_color: String },
}

#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub audio: PathBuf,
    pub output: PathBuf,
    pub background: Background,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
}

/// The external audio/video toolkit.
#[async_trait]
pub trait Composer: Send + Sync {
    /// Duration of the audio stream in seconds.
    async fn probe_duration(&self, audio: &Path) -> Result<f64, ConversionError>;

    /// Encode `request.background` held for `request.duration_secs` with the audio muxed in.
    async fn compose(&self, request: &CompositionRequest) -> Result<(), ConversionError>;
}
