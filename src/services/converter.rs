use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::types::{BackgroundKind, VideoSettings};
use crate::metrics::prometheus::{ACTIVE_ENCODES, CONVERSIONS_TOTAL, ENCODE_SECONDS};
use crate::services::composer::{
    Background, Composer, CompositionRequest, ConversionError, GeneratedVideo,
};
use crate::services::workspace::random_token;

/// Runs one audio file through the composer under the shared encode limits.
pub struct Converter {
    composer: Arc<dyn Composer>,
    encode_slots: Semaphore,
    encode_timeout: Duration,
}

impl Converter {
    pub fn new(
        composer: Arc<dyn Composer>,
        max_concurrent_encodes: usize,
        encode_timeout: Duration,
    ) -> Self {
        Self {
            composer,
            encode_slots: Semaphore::new(max_concurrent_encodes.max(1)),
            encode_timeout,
        }
    }

    pub async fn convert(
        &self,
        settings: &VideoSettings,
        audio: &Path,
        out_dir: &Path,
        background: BackgroundKind,
    ) -> Result<GeneratedVideo, ConversionError> {
        self.convert_tracked(settings, audio, out_dir, background, || {})
            .await
    }

    /// Like [`Converter::convert`], calling `on_started` once an encode slot
    /// is held and the encoder is about to run.
    pub async fn convert_tracked<F>(
        &self,
        settings: &VideoSettings,
        audio: &Path,
        out_dir: &Path,
        background: BackgroundKind,
        on_started: F,
    ) -> Result<GeneratedVideo, ConversionError>
    where
        F: FnOnce() + Send,
    {
        let result = self
            .run(settings, audio, out_dir, background, on_started)
            .await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => outcome_label(e),
        };
        CONVERSIONS_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn run<F>(
        &self,
        settings: &VideoSettings,
        audio: &Path,
        out_dir: &Path,
        background: BackgroundKind,
        on_started: F,
    ) -> Result<GeneratedVideo, ConversionError>
    where
        F: FnOnce() + Send,
    {
        let background = match background {
            BackgroundKind::Color => Background::Color {
                color: settings.ffmpeg_color(),
            },
            BackgroundKind::Image => {
                let path = PathBuf::from(&settings.image_path);
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(ConversionError::MissingAsset(path));
                }
                Background::Image {
                    path,
                    pad_color: settings.ffmpeg_color(),
                }
            }
        };

        let duration_secs = self.composer.probe_duration(audio).await?;
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(ConversionError::UnsupportedFormat(format!(
                "invalid duration {}",
                duration_secs
            )));
        }

        let output = out_dir.join(format!("output_{}.mp4", random_token()));
        let request = CompositionRequest {
            audio: audio.to_path_buf(),
            output: output.clone(),
            background,
            duration_secs,
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            video_codec: settings.video_codec.clone(),
            audio_codec: settings.audio_codec.clone(),
        };

        let _permit = self
            .encode_slots
            .acquire()
            .await
            .map_err(|_| ConversionError::EncodingFailed("encoder pool closed".to_string()))?;
        on_started();

        info!(
            "Encoding {:.2}s of audio from {} into {}",
            duration_secs,
            audio.display(),
            output.display()
        );
        let start = Instant::now();
        let active = ActiveEncode::start();
        // Dropping the compose future on timeout kills the child process.
        let composed =
            tokio::time::timeout(self.encode_timeout, self.composer.compose(&request)).await;
        drop(active);
        ENCODE_SECONDS.observe(start.elapsed().as_secs_f64());

        match composed {
            Ok(result) => result?,
            Err(_) => {
                warn!("Encode of {} timed out", audio.display());
                return Err(ConversionError::Timeout(self.encode_timeout));
            }
        }

        let size_bytes = match tokio::fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if size_bytes == 0 {
            return Err(ConversionError::EncodingFailed(
                "encoder produced no output".to_string(),
            ));
        }

        info!(
            "Encoded {} ({} bytes) in {:.2}s",
            output.display(),
            size_bytes,
            start.elapsed().as_secs_f64()
        );
        Ok(GeneratedVideo {
            path: output,
            duration_secs,
            size_bytes,
        })
    }
}

/// Keeps `a2v_active_encodes` right even when the request future is dropped.
struct ActiveEncode;

impl ActiveEncode {
    fn start() -> Self {
        ACTIVE_ENCODES.inc();
        ActiveEncode
    }
}

impl Drop for ActiveEncode {
    fn drop(&mut self) {
        ACTIVE_ENCODES.dec();
    }
}

pub fn outcome_label(err: &ConversionError) -> &'static str {
    match err {
        ConversionError::UnsupportedFormat(_) => "unsupported_format",
        ConversionError::EncodingFailed(_) => "encoding_failed",
        ConversionError::Timeout(_) => "timeout_error",
        ConversionError::MissingAsset(_) => "missing_asset",
        ConversionError::Io(_) => "internal_io",
    }
}
