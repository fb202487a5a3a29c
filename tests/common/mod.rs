#![allow(dead_code)]

use async_trait::async_trait;
use audio_video_api::config::config_manager::ConfigManager;
use audio_video_api::config::types::Config;
use audio_video_api::routes::create_router;
use audio_video_api::services::composer::{Composer, CompositionRequest, ConversionError};
use audio_video_api::services::converter::Converter;
use audio_video_api::services::jobs::JobStore;
use audio_video_api::state::app_state::AppState;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const BOUNDARY: &str = "a2v-test-boundary-7MA4YWxkTrZu0gW";
pub const FAKE_HEADER: &[u8] = b"FAKEMP4\n";

/// Stands in for ffmpeg: the "video" is a marker followed by the audio bytes,
/// and the duration is one millisecond per input byte.
pub struct FakeComposer {
    pub delay: Duration,
}

impl FakeComposer {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Composer for FakeComposer {
    async fn probe_duration(&self, audio: &Path) -> Result<f64, ConversionError> {
        let data = tokio::fs::read(audio).await?;
        if data.starts_with(b"corrupt") {
            return Err(ConversionError::UnsupportedFormat(
                "no audio stream found".to_string(),
            ));
        }
        Ok(data.len() as f64 / 1000.0)
    }

    async fn compose(&self, request: &CompositionRequest) -> Result<(), ConversionError> {
        tokio::time::sleep(self.delay).await;
        let mut out = FAKE_HEADER.to_vec();
        out.extend(tokio::fs::read(&request.audio).await?);
        tokio::fs::write(&request.output, out).await?;
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub root: TempDir,
}

impl TestApp {
    pub fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    /// Every file left under the work dir, recursively.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                }
                out.push(path);
            }
        }
        let mut out = Vec::new();
        walk(&self.work_dir(), &mut out);
        out
    }
}

pub fn test_app() -> TestApp {
    test_app_with(Config::default(), Arc::new(FakeComposer::new()))
}

pub fn test_app_with(mut config: Config, composer: Arc<dyn Composer>) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let work_dir = root.path().join("work");
    config.storage.work_dir = work_dir.to_string_lossy().to_string();

    let converter = Arc::new(Converter::new(
        composer,
        config.ffmpeg.max_concurrent_encodes,
        Duration::from_secs(config.ffmpeg.encode_timeout_secs),
    ));
    let jobs = Arc::new(JobStore::new(
        Duration::from_secs(config.jobs.result_ttl_secs),
        config.jobs.max_pending,
    ));
    let state = Arc::new(AppState::new(
        Arc::new(ConfigManager::from_config(config.clone())),
        converter,
        jobs,
        work_dir,
    ));
    let router = create_router(state.clone(), &config);

    TestApp {
        router,
        state,
        root,
    }
}

pub enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn expected_video(audio: &[u8]) -> Vec<u8> {
    let mut out = FAKE_HEADER.to_vec();
    out.extend_from_slice(audio);
    out
}
