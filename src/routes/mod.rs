use crate::{
    config::types::Config, metrics, middleware::access_log::access_log_middleware,
    state::app_state::AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod convert;
pub mod health;
pub mod index;
pub mod jobs;

pub fn create_router(app_state: Arc<AppState>, config: &Config) -> Router {
    let mut router = Router::new()
        .route("/", get(index::upload_form))
        .route("/health", get(health::health_check))
        .route("/convert", post(convert::handle_convert))
        .merge(metrics::exporter::create_metrics_router());

    if config.jobs.enabled {
        router = router
            .route("/jobs", post(jobs::handle_create_job))
            .route(
                "/jobs/:id",
                get(jobs::handle_job_status).delete(jobs::handle_delete_job),
            )
            .route("/jobs/:id/result", get(jobs::handle_job_result));
    }

    let mut router = router
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .with_state(app_state)
        .layer(axum_middleware::from_fn(
            metrics::middleware::metrics_middleware,
        ));

    if config.server.cors {
        router = router.layer(CorsLayer::permissive());
    }

    // Access log outermost.
    router.layer(axum_middleware::from_fn(access_log_middleware))
}
