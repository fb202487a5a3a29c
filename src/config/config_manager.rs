use super::types::Config;
use notify::{
    recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use validator::Validate;

pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    _watcher: Option<RecommendedWatcher>, // Keep watcher alive
}

impl ConfigManager {
    pub async fn new(config_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::load_config(config_path)?;
        let config_arc = Arc::new(RwLock::new(config));

        let watcher = Self::setup_watcher(config_path, config_arc.clone()).await?;

        Ok(ConfigManager {
            config: config_arc,
            _watcher: Some(watcher),
        })
    }

    /// Fixed configuration with no file behind it.
    pub fn from_config(config: Config) -> Self {
        ConfigManager {
            config: Arc::new(RwLock::new(config)),
            _watcher: None,
        }
    }

    pub fn load_config(config_path: &str) -> Result<Config, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn get_config(&self) -> Config {
        self.config.read().await.clone()
    }

    async fn setup_watcher(
        config_path_str: &str,
        config: Arc<RwLock<Config>>,
    ) -> NotifyResult<RecommendedWatcher> {
        let config_path_for_check = config_path_str.to_string();

        // The notify callback runs on its own thread; writes go back through the runtime.
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = recommended_watcher(move |res: NotifyResult<Event>| match res {
            Ok(event) => {
                // Editors often save to a temp file and rename, so match loosely.
                if event
                    .paths
                    .iter()
                    .any(|p| p.to_string_lossy().contains(&config_path_for_check))
                {
                    info!("Config file changed, reloading...");
                    std::thread::sleep(std::time::Duration::from_millis(100));

                    match Self::load_config(&config_path_for_check) {
                        Ok(new_config) => {
                            let config_clone = config.clone();
                            runtime_handle.spawn(async move {
                                let mut current = config_clone.write().await;
                                if apply_reload(&mut current, new_config) {
                                    warn!("Server, storage, ffmpeg and job settings take effect after restart");
                                }
                                info!("Config reloaded successfully.");
                            });
                        }
                        Err(e) => {
                            error!("Failed to reload config, keeping previous: {}", e);
                        }
                    }
                }
            }
            Err(e) => error!("watch error: {:?}", e),
        })?;

        // Watch the parent directory to catch atomic saves.
        let path_to_watch = match Path::new(config_path_str).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        watcher.watch(path_to_watch, RecursiveMode::NonRecursive)?;

        info!(
            "Started watching config file directory: {:?}",
            path_to_watch
        );
        Ok(watcher)
    }
}

/// Applies a freshly loaded file to the live config. Only the `video`
/// section changes; the rest was wired up at startup. Returns true when the
/// file also changed settings that need a restart.
fn apply_reload(current: &mut Config, next: Config) -> bool {
    let needs_restart = !same_startup_settings(current, &next);
    current.video = next.video;
    needs_restart
}

fn same_startup_settings(current: &Config, next: &Config) -> bool {
    current.server.port == next.server.port
        && current.server.max_upload_bytes == next.server.max_upload_bytes
        && current.server.cors == next.server.cors
        && current.storage.work_dir == next.storage.work_dir
        && current.ffmpeg.ffmpeg_path == next.ffmpeg.ffmpeg_path
        && current.ffmpeg.ffprobe_path == next.ffmpeg.ffprobe_path
        && current.ffmpeg.encode_timeout_secs == next.ffmpeg.encode_timeout_secs
        && current.ffmpeg.max_concurrent_encodes == next.ffmpeg.max_concurrent_encodes
        && current.jobs.enabled == next.jobs.enabled
        && current.jobs.result_ttl_secs == next.jobs.result_ttl_secs
        && current.jobs.sweep_interval_secs == next.jobs.sweep_interval_secs
        && current.jobs.max_pending == next.jobs.max_pending
}
