use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Color,
    Image,
}

impl BackgroundKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "color" | "colour" => Some(BackgroundKind::Color),
            "image" => Some(BackgroundKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundKind::Color => "color",
            BackgroundKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    #[validate]
    pub video: VideoSettings,
    #[serde(default)]
    #[validate]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    #[validate]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on the whole request body, multipart framing included.
    #[serde(default = "default_max_upload_bytes")]
    #[validate(range(min = 1024))]
    pub max_upload_bytes: usize,
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root under which per-request workspaces are created.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
        }
    }
}

/// Encoding parameters. This section is hot-reloaded and read per request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_even_dimensions"))]
pub struct VideoSettings {
    #[serde(default = "default_width")]
    #[validate(range(min = 16, max = 7680))]
    pub width: u32,
    #[serde(default = "default_height")]
    #[validate(range(min = 16, max = 7680))]
    pub height: u32,
    #[serde(default = "default_fps")]
    #[validate(range(min = 1, max = 120))]
    pub fps: u32,
    #[serde(default = "default_color")]
    #[validate(custom = "validate_hex_color")]
    pub color: String,
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default = "default_background")]
    pub default_background: BackgroundKind,
    #[serde(default = "default_video_codec")]
    #[validate(length(min = 1))]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    #[validate(length(min = 1))]
    pub audio_codec: String,
    #[serde(default = "default_download_name")]
    #[validate(length(min = 1, max = 255))]
    pub download_name: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            color: default_color(),
            image_path: default_image_path(),
            default_background: default_background(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            download_name: default_download_name(),
        }
    }
}

impl VideoSettings {
    /// `#rrggbb` to the `0xrrggbb` form the lavfi color source expects.
    pub fn ffmpeg_color(&self) -> String {
        format!("0x{}", self.color.trim_start_matches('#'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    #[serde(default = "default_encode_timeout_secs")]
    #[validate(range(min = 1))]
    pub encode_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_encodes")]
    #[validate(range(min = 1, max = 256))]
    pub max_concurrent_encodes: usize,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            encode_timeout_secs: default_encode_timeout_secs(),
            max_concurrent_encodes: default_max_concurrent_encodes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_result_ttl_secs")]
    #[validate(range(min = 1))]
    pub result_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,
    /// Jobs accepted but not yet finished. Further submissions get a 503.
    #[serde(default = "default_max_pending")]
    #[validate(range(min = 1))]
    pub max_pending: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            result_ttl_secs: default_result_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_pending: default_max_pending(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_general_retention")]
    pub general_log_retention_days: usize,
    #[serde(default = "default_error_retention")]
    pub error_log_retention_days: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            general_log_retention_days: default_general_retention(),
            error_log_retention_days: default_error_retention(),
        }
    }
}

fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    if HEX_COLOR.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

// libx264 with yuv420p rejects odd frame sizes.
fn validate_even_dimensions(settings: &VideoSettings) -> Result<(), ValidationError> {
    if settings.width % 2 != 0 || settings.height % 2 != 0 {
        return Err(ValidationError::new("even_dimensions"));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}
fn default_port() -> u16 {
    8000
}
fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}
fn default_work_dir() -> String {
    "tmp".to_string()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_fps() -> u32 {
    24
}
fn default_color() -> String {
    "#1e1e1e".to_string()
}
fn default_image_path() -> String {
    "static/image.jpg".to_string()
}
fn default_background() -> BackgroundKind {
    BackgroundKind::Color
}
fn default_video_codec() -> String {
    "libx264".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_download_name() -> String {
    "output.mp4".to_string()
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}
fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}
fn default_encode_timeout_secs() -> u64 {
    600
}
fn default_max_concurrent_encodes() -> usize {
    2
}
fn default_result_ttl_secs() -> u64 {
    3600
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_max_pending() -> usize {
    32
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_general_retention() -> usize {
    10
}
fn default_error_retention() -> usize {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.video.width, 1280);
        assert_eq!(config.video.height, 720);
        assert_eq!(config.video.fps, 24);
        assert_eq!(config.video.default_background, BackgroundKind::Color);
        assert_eq!(config.video.download_name, "output.mp4");
        assert!(config.jobs.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let yaml = r##"
video:
  color: "#000000"
  default_background: image
"##;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.video.color, "#000000");
        assert_eq!(config.video.default_background, BackgroundKind::Image);
        assert_eq!(config.video.video_codec, "libx264");
        assert_eq!(config.video.ffmpeg_color(), "0x000000");
    }

    #[test]
    fn test_rejects_bad_color() {
        let mut config = Config::default();
        config.video.color = "grey".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_odd_dimensions() {
        let mut config = Config::default();
        config.video.width = 1281;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.ffmpeg.max_concurrent_encodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_pending_jobs() {
        let mut config = Config::default();
        assert_eq!(config.jobs.max_pending, 32);
        config.jobs.max_pending = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_background_parse() {
        assert_eq!(BackgroundKind::parse("Image"), Some(BackgroundKind::Image));
        assert_eq!(BackgroundKind::parse(" color "), Some(BackgroundKind::Color));
        assert_eq!(BackgroundKind::parse("video"), None);
    }
}
