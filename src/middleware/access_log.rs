use axum::{body::Body, extract::ConnectInfo, http::Request, middleware::Next, response::Response};
use chrono::Local;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{error, info};

use crate::handlers::utils::get_client_ip;
use crate::models::AccessLogMeta;

/// Access log middleware.
///
/// One line per request in the style of the Nginx combined format, followed
/// by latency, the uploaded file and the error (if any). Errors are logged
/// at ERROR so they also land in the error log file.
pub async fn access_log_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();
    let headers = req.headers().clone();

    let addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let client_ip = get_client_ip(&headers, addr);

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    // Not always present.
    let body_bytes = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let (upload, error_msg) = match response.extensions().get::<AccessLogMeta>() {
        Some(meta) => (
            meta.upload.as_str(),
            meta.error.clone().unwrap_or_else(|| "-".to_string()),
        ),
        None => ("-", "-".to_string()),
    };

    // IP - - [Time] "Method URI Version" Status Bytes "Referer" "UserAgent" Latency "Upload" "Error"
    let time_str = Local::now().format("%d/%b/%Y:%H:%M:%S %z");

    let log_line = format!(
        "{} - - [{}] \"{} {} {:?}\" {} {} \"-\" \"{}\" {:.3}s \"{}\" {:?}",
        client_ip,
        time_str,
        method,
        uri,
        version,
        status.as_u16(),
        body_bytes,
        user_agent,
        latency.as_secs_f64(),
        upload,
        error_msg
    );

    if status.is_server_error() || status.is_client_error() {
        error!(target: "access_log", "{}", log_line);
    } else {
        info!(target: "access_log", "{}", log_line);
    }

    response
}
