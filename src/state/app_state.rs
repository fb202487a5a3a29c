use crate::config::config_manager::ConfigManager;
use crate::services::converter::Converter;
use crate::services::jobs::JobStore;
use crate::services::workspace::Workspace;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub config_manager: Arc<ConfigManager>,
    pub converter: Arc<Converter>,
    pub jobs: Arc<JobStore>,
    pub work_dir: PathBuf,
}

impl AppState {
    pub fn new(
        config_manager: Arc<ConfigManager>,
        converter: Arc<Converter>,
        jobs: Arc<JobStore>,
        work_dir: PathBuf,
    ) -> Self {
        AppState {
            config_manager,
            converter,
            jobs,
            work_dir,
        }
    }

    /// Fresh scratch directory under the configured work dir. Directory
    /// creation runs on the blocking pool.
    pub async fn new_workspace(&self) -> io::Result<Workspace> {
        let root = self.work_dir.clone();
        tokio::task::spawn_blocking(move || Workspace::create(&root))
            .await
            .map_err(io::Error::other)?
    }
}
