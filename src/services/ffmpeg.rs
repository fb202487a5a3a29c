//! FFmpeg subprocess handling: duration probing and audio + still video encoding.

use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

use super::composer::{Background, Composer, CompositionRequest, ConversionError};

#[derive(Debug, Clone)]
pub struct FfmpegComposer {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegComposer {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Both binaries resolve on PATH (or exist as given).
    pub fn available(&self) -> bool {
        which::which(&self.ffmpeg).is_ok() && which::which(&self.ffprobe).is_ok()
    }
}

#[async_trait]
impl Composer for FfmpegComposer {
    async fn probe_duration(&self, audio: &Path) -> Result<f64, ConversionError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "a"])
            .args(["-show_entries", "stream=codec_type:format=duration"])
            .args(["-of", "json"])
            .arg(audio)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error("ffprobe", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::UnsupportedFormat(last_lines(&stderr, 2)));
        }

        parse_probe_output(&output.stdout)
    }

    async fn compose(&self, request: &CompositionRequest) -> Result<(), ConversionError> {
        let args = build_compose_args(request);
        debug!("Running {} {:?}", self.ffmpeg.display(), args);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error("ffmpeg", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffmpeg exited with {}: {}", output.status, stderr.trim());
            return Err(ConversionError::EncodingFailed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                last_lines(&stderr, 3)
            )));
        }
        Ok(())
    }
}

fn spawn_error(tool: &str, err: std::io::Error) -> ConversionError {
    if err.kind() == ErrorKind::NotFound {
        ConversionError::EncodingFailed(format!("{} is not installed or not on PATH", tool))
    } else {
        ConversionError::EncodingFailed(format!("Failed to spawn {}: {}", tool, err))
    }
}

fn parse_probe_output(stdout: &[u8]) -> Result<f64, ConversionError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout).map_err(|e| {
        ConversionError::UnsupportedFormat(format!("unreadable ffprobe output: {}", e))
    })?;

    if !probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"))
    {
        return Err(ConversionError::UnsupportedFormat(
            "no audio stream found".to_string(),
        ));
    }

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| ConversionError::UnsupportedFormat("unknown duration".to_string()))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(ConversionError::UnsupportedFormat(format!(
            "invalid duration {}",
            duration
        )));
    }
    Ok(duration)
}

/// Arguments for one encode. The video input is always stream 0, audio stream 1.
pub fn build_compose_args(request: &CompositionRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
        .iter()
        .map(OsString::from)
        .collect();

    let fps = request.fps.to_string();
    let (w, h) = (request.width, request.height);

    match &request.background {
        Background::Color { color } => {
            args.extend(["-f", "lavfi", "-i"].map(OsString::from));
            args.push(format!("color=c={}:s={}x{}:r={}", color, w, h, fps).into());
        }
        Background::Image { path, .. } => {
            args.extend(["-loop", "1", "-framerate"].map(OsString::from));
            args.push(fps.clone().into());
            args.push("-i".into());
            args.push(path.as_os_str().to_owned());
        }
    }

    args.push("-i".into());
    args.push(request.audio.as_os_str().to_owned());
    args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(OsString::from));
    args.push("-t".into());
    args.push(format!("{:.3}", request.duration_secs).into());

    if let Background::Image { pad_color, .. } = &request.background {
        args.push("-vf".into());
        args.push(
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={pad_color},format=yuv420p"
            )
            .into(),
        );
        args.extend(["-tune", "stillimage"].map(OsString::from));
    } else {
        args.extend(["-pix_fmt", "yuv420p"].map(OsString::from));
    }

    args.push("-c:v".into());
    args.push(request.video_codec.clone().into());
    args.push("-r".into());
    args.push(fps.into());
    args.push("-c:a".into());
    args.push(request.audio_codec.clone().into());
    args.extend(["-movflags", "+faststart"].map(OsString::from));
    args.push(request.output.as_os_str().to_owned());
    args
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "no diagnostic output".to_string();
    }
    lines[lines.len().saturating_sub(n)..].join(" | ")
}
