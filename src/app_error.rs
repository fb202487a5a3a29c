use crate::models::AccessLogMeta;
use crate::services::composer::ConversionError;
use crate::services::jobs::JobFailure;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    Conversion(ConversionError),
    JobNotFound(String),
    JobNotReady(String, String), // id, current status
    ServerBusy(String),
    InternalServerError(String),
    ApiError(StatusCode, String, String), // status_code, message, error_type
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "{}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::Conversion(err) => write!(f, "{}", err),
            AppError::JobNotFound(id) => write!(f, "Job `{}` does not exist.", id),
            AppError::JobNotReady(id, status) => {
                write!(f, "Job `{}` is {}; the result is not ready yet.", id, status)
            }
            AppError::ServerBusy(msg) => write!(f, "Server busy: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {}", msg),
            AppError::ApiError(_, message, error_type) => write!(f, "{}: {}", error_type, message),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::Conversion(err) => match err {
                ConversionError::UnsupportedFormat(_) => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
                }
                ConversionError::EncodingFailed(_) => (StatusCode::BAD_GATEWAY, "encoding_failed"),
                ConversionError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
                ConversionError::MissingAsset(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "missing_asset")
                }
                ConversionError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_io"),
            },
            AppError::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::JobNotReady(_, _) => (StatusCode::CONFLICT, "job_not_ready"),
            AppError::ServerBusy(_) => (StatusCode::SERVICE_UNAVAILABLE, "server_busy"),
            AppError::InternalServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            AppError::ApiError(status, _, _) => (*status, "api_error"),
        }
    }

    /// Snapshot stored on a failed job so its result endpoint can replay the error.
    pub fn to_job_failure(&self) -> JobFailure {
        let (status, error_type) = self.parts();
        JobFailure {
            status_code: status.as_u16(),
            error: self.to_string(),
            error_type: error_type.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.parts();
        let error_type = match &self {
            AppError::ApiError(_, _, error_type) => error_type.clone(),
            _ => error_type.to_string(),
        };
        let error_message = match &self {
            AppError::ApiError(_, message, _) => message.clone(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("{} ({})", error_message, error_type);
        } else {
            tracing::warn!("{} ({})", error_message, error_type);
        }

        let body = Json(json!({
            "error": error_message,
            "error_type": error_type
        }));

        let mut response = (status, body).into_response();

        // Surface the error in the access log line.
        response.extensions_mut().insert(AccessLogMeta {
            upload: "-".to_string(),
            error: Some(error_message),
        });

        response
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        AppError::Conversion(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Conversion(ConversionError::Io(err))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
        }
    }
}

impl From<JobFailure> for AppError {
    fn from(failure: JobFailure) -> Self {
        let status =
            StatusCode::from_u16(failure.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        AppError::ApiError(status, failure.error, failure.error_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_conversion_error_statuses() {
        let cases = [
            (
                ConversionError::UnsupportedFormat("x".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                ConversionError::EncodingFailed("x".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ConversionError::Timeout(Duration::from_secs(1)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ConversionError::MissingAsset(PathBuf::from("static/image.jpg")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_error_response_carries_access_log_meta() {
        let response = AppError::BadRequest("No selected file".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let meta = response.extensions().get::<AccessLogMeta>().unwrap();
        assert_eq!(meta.error.as_deref(), Some("No selected file"));
    }

    #[test]
    fn test_job_failure_round_trip() {
        let failure =
            AppError::from(ConversionError::UnsupportedFormat("no audio".into())).to_job_failure();
        assert_eq!(failure.status_code, 415);
        assert_eq!(failure.error_type, "unsupported_format");

        let replayed = AppError::from(failure).into_response();
        assert_eq!(replayed.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
