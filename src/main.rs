use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use audio_video_api::config::config_manager::ConfigManager;
use audio_video_api::logging::{init_logging, LogConfig};
use audio_video_api::routes;
use audio_video_api::services::converter::Converter;
use audio_video_api::services::ffmpeg::FfmpegComposer;
use audio_video_api::services::jobs::JobStore;
use audio_video_api::services::workspace::purge_stale_workspaces;
use audio_video_api::state::app_state::AppState;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to build tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run()) {
        eprintln!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    // Logging comes from a plain read so the watcher setup below is logged too.
    let bootstrap = ConfigManager::load_config(&config_path)?;
    // File + console logging; guards must outlive the server.
    let _guards = init_logging(LogConfig::from(&bootstrap.logging))?;

    let config_manager = Arc::new(ConfigManager::new(&config_path).await?);
    let config = config_manager.get_config().await;
    info!("Loaded configuration from {}", config_path);

    let work_dir = PathBuf::from(&config.storage.work_dir);
    let purged = purge_stale_workspaces(&work_dir)?;
    if purged > 0 {
        warn!("Removed {} stale workspace(s) from {}", purged, work_dir.display());
    }

    let composer = FfmpegComposer::new(&config.ffmpeg.ffmpeg_path, &config.ffmpeg.ffprobe_path);
    if !composer.available() {
        warn!(
            "ffmpeg/ffprobe not found ({} / {}); conversions will fail",
            config.ffmpeg.ffmpeg_path, config.ffmpeg.ffprobe_path
        );
    }
    let converter = Arc::new(Converter::new(
        Arc::new(composer),
        config.ffmpeg.max_concurrent_encodes,
        Duration::from_secs(config.ffmpeg.encode_timeout_secs),
    ));

    let jobs = Arc::new(JobStore::new(
        Duration::from_secs(config.jobs.result_ttl_secs),
        config.jobs.max_pending,
    ));
    if config.jobs.enabled {
        jobs.clone()
            .spawn_sweeper(Duration::from_secs(config.jobs.sweep_interval_secs));
    }

    let app_state = Arc::new(AppState::new(config_manager, converter, jobs, work_dir));
    let app = routes::create_router(app_state, &config);

    let port = match std::env::var("SERVER_PORT") {
        Ok(value) => value.parse::<u16>()?,
        Err(_) => config.server.port,
    };
    // "::" is dual-stack on most systems.
    let addr = SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
